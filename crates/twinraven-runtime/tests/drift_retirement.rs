//! End-to-end scenario: a promoted tool's source chain goes quiet in recent
//! events, and a drift scan with auto-retirement enabled retires it.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Duration, Utc};

use twinraven_core::RegistryConfig;
use twinraven_runtime::ToolRegistry;
use twinraven_store::{EventStore, RegistryStore};
use twinraven_testing::fixtures;
use twinraven_types::{RetirementReason, ToolState};

#[tokio::test]
async fn drifting_tool_is_retired_after_scan() {
    let tools_dir = tempfile::tempdir().unwrap();
    let registry_store = RegistryStore::open_in_memory().unwrap();
    let event_store = Arc::new(StdMutex::new(EventStore::open_in_memory().unwrap()));

    let config = RegistryConfig {
        drift_threshold: 0.5,
        auto_retire_on_drift: true,
        ..RegistryConfig::default()
    };
    let registry = ToolRegistry::new(registry_store, event_store.clone(), config, tools_dir.path());

    let mut tool = fixtures::synthesized_tool("search_read", &["search", "read"], ToolState::Promoted);
    tool.source_chain.support = 0.8;
    registry
        .register(&tool, fixtures::validation_result("search_read", 1, 3))
        .await
        .unwrap();

    // 3 of 10 sessions still run the chain; the rest moved on to an
    // unrelated tool, dropping the chain's support from 0.8 to 0.3.
    let mut events = Vec::new();
    for i in 0..3 {
        events.extend(fixtures::session_chain(&format!("hit-{}", i), &["search", "read"]));
    }
    for i in 0..7 {
        events.extend(fixtures::session_chain(&format!("miss-{}", i), &["other"]));
    }
    event_store.lock().unwrap().append_batch(&events).unwrap();

    let since = Utc::now() - Duration::days(365);
    let flagged = registry.drift_scan(since).await.unwrap();

    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].slug, "search_read");
    assert!((flagged[0].ratio - 0.375).abs() < 1e-9);

    let record = registry.get("search_read").unwrap().unwrap();
    assert_eq!(record.retirement_reason, Some(RetirementReason::Drift));
    assert!(registry.list(Some(ToolState::Promoted)).unwrap().is_empty());
}
