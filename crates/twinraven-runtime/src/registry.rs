use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use twinraven_core::RegistryConfig;
use twinraven_engine::Miner;
use twinraven_store::{EventStore, RegistryStore};
use twinraven_types::{
    RetirementReason, SynthesizedTool, ToolRecord, ToolState, ToolVersion, ValidationResult,
};

use crate::error::{Error, Result};

/// A promoted tool flagged as drifting, paired with its current/original
/// support ratio.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DriftFlag {
    pub slug: String,
    pub ratio: f64,
}

/// Versioned storage for promoted tools: one JSON document per (slug,
/// version) under `tools_dir`, backed by `RegistryStore` for the
/// `tool_records`/`tool_versions` bookkeeping. Writes serialize per slug via
/// an advisory lock table; reads never block on it.
pub struct ToolRegistry {
    store: RegistryStore,
    event_store: Arc<StdMutex<EventStore>>,
    config: RegistryConfig,
    tools_dir: PathBuf,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ToolRegistry {
    pub fn new(
        store: RegistryStore,
        event_store: Arc<StdMutex<EventStore>>,
        config: RegistryConfig,
        tools_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            event_store,
            config,
            tools_dir: tools_dir.into(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    async fn lock_slug(&self, slug: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("registry lock table poisoned");
        locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Registers a synthesized, already-promoted tool as a new version: a
    /// re-synthesis of an existing slug bumps `current_version` by one and
    /// marks the prior version's `superseded_at`; a brand-new slug starts at
    /// version 1. No version numbers are reused or skipped.
    pub async fn register(
        &self,
        tool: &SynthesizedTool,
        validation: ValidationResult,
    ) -> Result<ToolRecord> {
        if tool.state != ToolState::Promoted {
            return Err(Error::IllegalTransition {
                from: tool.state.to_string(),
                to: ToolState::Promoted.to_string(),
            });
        }

        let lock = self.lock_slug(&tool.slug).await;
        let _guard = lock.lock().await;

        let existing = self.store.get_record(&tool.slug)?;
        let version = existing.as_ref().map(|r| r.current_version + 1).unwrap_or(1);
        let now = Utc::now();

        let path = write_version_document(&self.tools_dir, &tool.slug, version, tool)?;
        write_metadata_document(&self.tools_dir, &tool.slug, version, now)?;

        if let Some(prev) = &existing {
            self.store
                .supersede_version(&tool.slug, prev.current_version, now)?;
        }

        self.store.insert_version(&ToolVersion {
            slug: tool.slug.clone(),
            version,
            validation,
            created_at: now,
            superseded_at: None,
        })?;

        let record = ToolRecord {
            slug: tool.slug.clone(),
            current_version: version,
            definition_path: path.to_string_lossy().into_owned(),
            registered_at: existing.as_ref().map(|r| r.registered_at).unwrap_or(now),
            last_used_at: existing.as_ref().and_then(|r| r.last_used_at),
            invocation_count: existing.as_ref().map(|r| r.invocation_count).unwrap_or(0),
            retirement_reason: None,
        };
        self.store.upsert_record(&record)?;
        Ok(record)
    }

    pub fn get(&self, slug: &str) -> Result<Option<ToolRecord>> {
        self.store.get_record(slug).map_err(Error::from)
    }

    /// Lists registered tools, optionally restricted to `Promoted` or
    /// `Retired` status (the only two states a tool in the registry can be
    /// in — draft/testing tools never reach the registry).
    pub fn list(&self, status: Option<ToolState>) -> Result<Vec<ToolRecord>> {
        let all = self.store.list_records()?;
        Ok(match status {
            None => all,
            Some(ToolState::Retired) => all
                .into_iter()
                .filter(|r| r.retirement_reason.is_some())
                .collect(),
            Some(ToolState::Promoted) => all
                .into_iter()
                .filter(|r| r.retirement_reason.is_none())
                .collect(),
            Some(_) => Vec::new(),
        })
    }

    /// Re-points a slug's active version to an already-registered version
    /// without writing a new document.
    pub async fn promote(&self, slug: &str, version: u32) -> Result<ToolRecord> {
        let lock = self.lock_slug(slug).await;
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .get_record(slug)?
            .ok_or_else(|| Error::UnknownTool(slug.to_string()))?;
        let history = self.store.version_history(slug)?;
        if !history.iter().any(|v| v.version == version) {
            return Err(Error::UnknownTool(format!("{} version {}", slug, version)));
        }

        record.current_version = version;
        record.definition_path = version_document_path(&self.tools_dir, slug, version)
            .to_string_lossy()
            .into_owned();
        self.store.upsert_record(&record)?;
        write_metadata_document(&self.tools_dir, slug, version, Utc::now())?;
        Ok(record)
    }

    pub async fn retire(&self, slug: &str, reason: RetirementReason) -> Result<()> {
        let lock = self.lock_slug(slug).await;
        let _guard = lock.lock().await;
        if self.store.get_record(slug)?.is_none() {
            return Err(Error::UnknownTool(slug.to_string()));
        }
        self.store.set_retirement(slug, reason)?;
        Ok(())
    }

    pub fn record_usage(&self, slug: &str) -> Result<()> {
        self.store.record_usage(slug, Utc::now()).map_err(Error::from)
    }

    pub fn version_history(&self, slug: &str) -> Result<Vec<ToolVersion>> {
        self.store.version_history(slug).map_err(Error::from)
    }

    /// Tools unused since `unused_since`, or never used and registered before
    /// it.
    pub fn stale(&self, unused_since: DateTime<Utc>) -> Result<Vec<ToolRecord>> {
        let all = self.store.list_records()?;
        Ok(all
            .into_iter()
            .filter(|r| r.retirement_reason.is_none())
            .filter(|r| match r.last_used_at {
                Some(last) => last < unused_since,
                None => r.registered_at < unused_since,
            })
            .collect())
    }

    /// Auto-retires every promoted tool whose `last_used_at` (or
    /// `registered_at`, if never used) is older than
    /// `config.auto_retire_after_days`.
    pub async fn staleness_scan(&self) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.auto_retire_after_days);
        let stale = self.stale(cutoff)?;
        let mut retired = Vec::new();
        for record in stale {
            self.retire(&record.slug, RetirementReason::Unused).await?;
            retired.push(record.slug);
        }
        Ok(retired)
    }

    /// Over the last 7 days of events for each promoted tool's source chain,
    /// retires any tool whose failure rate exceeds
    /// `config.failure_spike_threshold`.
    pub async fn failure_spike_scan(&self) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(7);
        let mut flagged = Vec::new();
        for record in self.list(Some(ToolState::Promoted))? {
            let tool = self.load_definition(&record)?;
            let events = self
                .event_store
                .lock()
                .expect("event store mutex poisoned")
                .all_events()?;

            let chain_tools = &tool.source_chain.tools;
            let mut total = 0u64;
            let mut failed = 0u64;
            for event in &events {
                if event.timestamp < cutoff {
                    continue;
                }
                if chain_tools.last().map(|t| t == &event.tool_id).unwrap_or(false) {
                    total += 1;
                    if event.outcome == twinraven_types::Outcome::Failure {
                        failed += 1;
                    }
                }
            }
            if total == 0 {
                continue;
            }
            let rate = failed as f64 / total as f64;
            if rate > self.config.failure_spike_threshold {
                self.retire(&record.slug, RetirementReason::FailureSpike).await?;
                flagged.push(record.slug);
            }
        }
        Ok(flagged)
    }

    /// Re-runs the Miner restricted to each promoted tool's source chain over
    /// recent sessions and compares current support against the support
    /// recorded at synthesis time.
    pub async fn drift_scan(&self, since: DateTime<Utc>) -> Result<Vec<DriftFlag>> {
        let mut flagged = Vec::new();
        for record in self.list(Some(ToolState::Promoted))? {
            let tool = self.load_definition(&record)?;
            let mut mining_config = tool.source_chain.mining_config.clone();
            mining_config.since = Some(since);
            mining_config.until = None;

            let events = self
                .event_store
                .lock()
                .expect("event store mutex poisoned")
                .all_events()?;
            let candidates = Miner::mine(&events, &mining_config)?;

            let current_support = candidates
                .iter()
                .find(|c| c.tools == tool.source_chain.tools)
                .map(|c| c.support)
                .unwrap_or(0.0);
            let original_support = tool.source_chain.support.max(f64::EPSILON);
            let ratio = current_support / original_support;

            if ratio < self.config.drift_threshold {
                flagged.push(DriftFlag {
                    slug: record.slug.clone(),
                    ratio,
                });
                if self.config.auto_retire_on_drift {
                    self.retire(&record.slug, RetirementReason::Drift).await?;
                }
            }
        }
        Ok(flagged)
    }

    fn load_definition(&self, record: &ToolRecord) -> Result<SynthesizedTool> {
        let body = std::fs::read_to_string(&record.definition_path)?;
        let tool: SynthesizedTool = serde_json::from_str(&body)?;
        Ok(tool)
    }
}

/// Root under `tools_dir` holding every slug's versioned documents, per the
/// on-disk registry layout: `generated/<slug>/v<N>.json` plus a
/// `generated/<slug>/metadata.json` sidecar.
fn generated_root(tools_dir: &Path) -> PathBuf {
    tools_dir.join("generated")
}

fn version_document_path(tools_dir: &Path, slug: &str, version: u32) -> PathBuf {
    generated_root(tools_dir).join(slug).join(format!("v{}.json", version))
}

fn metadata_path(tools_dir: &Path, slug: &str) -> PathBuf {
    generated_root(tools_dir).join(slug).join("metadata.json")
}

fn write_version_document(
    tools_dir: &Path,
    slug: &str,
    version: u32,
    tool: &SynthesizedTool,
) -> Result<PathBuf> {
    let dir = generated_root(tools_dir).join(slug);
    std::fs::create_dir_all(&dir)?;
    let final_path = dir.join(format!("v{}.json", version));
    let tmp_path = dir.join(format!(".v{}.json.tmp", version));

    let body = serde_json::to_vec_pretty(tool)?;
    if let Err(err) = std::fs::write(&tmp_path, &body) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::from(err));
    }
    if let Err(err) = std::fs::rename(&tmp_path, &final_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::from(err));
    }
    Ok(final_path)
}

/// Version metadata sidecar: current version plus the slug's first-seen and
/// last-updated timestamps, so a reader doesn't need to enumerate every
/// `v<N>.json` to learn the active version.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ToolMetadataDocument {
    current_version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn write_metadata_document(tools_dir: &Path, slug: &str, version: u32, now: DateTime<Utc>) -> Result<()> {
    let dir = generated_root(tools_dir).join(slug);
    std::fs::create_dir_all(&dir)?;
    let path = metadata_path(tools_dir, slug);

    let created_at = std::fs::read_to_string(&path)
        .ok()
        .and_then(|body| serde_json::from_str::<ToolMetadataDocument>(&body).ok())
        .map(|existing| existing.created_at)
        .unwrap_or(now);

    let metadata = ToolMetadataDocument {
        current_version: version,
        created_at,
        updated_at: now,
    };
    std::fs::write(&path, serde_json::to_vec_pretty(&metadata)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinraven_types::{
        CandidateChain, EquivalenceScore, EventId, MiningConfig, SimilarityMethod, StepDefinition,
    };

    fn chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 0.5,
            confidence: 0.9,
            avg_latency_ms: 100.0,
            failure_rate: 0.0,
            sample_event_ids: vec![EventId::new()],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    fn tool(slug: &str, state: ToolState) -> SynthesizedTool {
        SynthesizedTool {
            slug: slug.to_string(),
            description: "search then read".into(),
            parameters: json!({}),
            steps: vec![
                StepDefinition {
                    index: 0,
                    tool_id: "search".into(),
                    input_mapping: Default::default(),
                    predicate: None,
                    parallelizable_with: vec![],
                    timeout_ms: None,
                },
                StepDefinition {
                    index: 1,
                    tool_id: "read".into(),
                    input_mapping: Default::default(),
                    predicate: None,
                    parallelizable_with: vec![],
                    timeout_ms: None,
                },
            ],
            error_strategy: Default::default(),
            source_chain: chain(),
            version: 1,
            state,
            created_at: Utc::now(),
            promoted_at: None,
            retired_at: None,
            retirement_reason: None,
        }
    }

    fn validation(slug: &str) -> ValidationResult {
        ValidationResult {
            id: uuid::Uuid::new_v4(),
            tool_slug: slug.to_string(),
            tool_version: 1,
            sessions_replayed: 3,
            equivalence: EquivalenceScore {
                mean: 0.95,
                min: 0.9,
                method: SimilarityMethod::CosineTfidf,
                threshold: 0.8,
            },
            error_parity: true,
            latency_ratio: 1.0,
            pass: true,
            failure_reasons: vec![],
            validated_at: Utc::now(),
        }
    }

    fn registry(dir: &Path) -> ToolRegistry {
        let store = RegistryStore::open_in_memory().unwrap();
        let event_store = Arc::new(StdMutex::new(EventStore::open_in_memory().unwrap()));
        ToolRegistry::new(store, event_store, RegistryConfig::default(), dir)
    }

    #[tokio::test]
    async fn registering_a_draft_tool_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let result = registry
            .register(&tool("search-read", ToolState::Draft), validation("search-read"))
            .await;
        assert!(matches!(result, Err(Error::IllegalTransition { .. })));
    }

    #[tokio::test]
    async fn register_then_resynthesize_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let t = tool("search-read", ToolState::Promoted);

        let v1 = registry.register(&t, validation("search-read")).await.unwrap();
        assert_eq!(v1.current_version, 1);

        let v2 = registry.register(&t, validation("search-read")).await.unwrap();
        assert_eq!(v2.current_version, 2);

        let history = registry.version_history("search-read").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].superseded_at.is_some());
    }

    #[tokio::test]
    async fn register_writes_generated_layout_with_v_prefix_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let t = tool("search-read", ToolState::Promoted);

        let record = registry.register(&t, validation("search-read")).await.unwrap();
        assert!(record.definition_path.ends_with(
            Path::new("generated").join("search-read").join("v1.json").to_str().unwrap()
        ));
        assert!(dir.path().join("generated/search-read/v1.json").exists());

        let metadata_body =
            std::fs::read_to_string(dir.path().join("generated/search-read/metadata.json")).unwrap();
        let metadata: ToolMetadataDocument = serde_json::from_str(&metadata_body).unwrap();
        assert_eq!(metadata.current_version, 1);

        registry.register(&t, validation("search-read")).await.unwrap();
        let metadata_body =
            std::fs::read_to_string(dir.path().join("generated/search-read/metadata.json")).unwrap();
        let metadata: ToolMetadataDocument = serde_json::from_str(&metadata_body).unwrap();
        assert_eq!(metadata.current_version, 2);
    }

    #[tokio::test]
    async fn retire_moves_tool_out_of_promoted_listing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let t = tool("search-read", ToolState::Promoted);
        registry.register(&t, validation("search-read")).await.unwrap();

        registry.retire("search-read", RetirementReason::Manual).await.unwrap();
        assert!(registry.list(Some(ToolState::Promoted)).unwrap().is_empty());
        assert_eq!(registry.list(Some(ToolState::Retired)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_tool_is_flagged_before_threshold_and_retired_after_scan() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let t = tool("search-read", ToolState::Promoted);
        registry.register(&t, validation("search-read")).await.unwrap();

        let far_future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(registry.stale(far_future).unwrap().len(), 1);
    }
}
