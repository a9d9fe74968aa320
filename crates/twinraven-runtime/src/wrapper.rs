use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use twinraven_types::Outcome;

use crate::collector::ObservationContext;

/// Wraps one tool invocation: times it, emits the resulting event through
/// `ctx`, and forwards the original result untouched — a telemetry failure
/// never masks or replaces the wrapped call's own outcome.
pub async fn intercept<F, Fut, T, E>(
    ctx: &mut ObservationContext,
    tool_id: &str,
    inputs: Value,
    tags: Vec<String>,
    call: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    T: Serialize,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let result = call().await;
    let latency_ms = started.elapsed().as_millis() as i32;

    match &result {
        Ok(value) => {
            let output = serde_json::to_value(value).unwrap_or(Value::Null);
            if let Err(err) = ctx
                .record(tool_id, inputs, output, Outcome::Success, tags, latency_ms)
                .await
            {
                tracing::error!(error = %err, tool_id, "failed to record successful tool call");
            }
        }
        Err(err) => {
            if let Err(record_err) = ctx
                .record_failure(tool_id, inputs, err.to_string(), tags, latency_ms)
                .await
            {
                tracing::error!(error = %record_err, tool_id, "failed to record failed tool call");
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinraven_core::CollectorConfig;
    use twinraven_store::EventStore;

    #[tokio::test]
    async fn successful_call_is_forwarded_and_recorded() {
        let collector = crate::collector::Collector::new(
            EventStore::open_in_memory().unwrap(),
            CollectorConfig::default(),
        );
        let mut ctx = collector.observe("s1").await.unwrap();

        let result: Result<i32, String> = intercept(&mut ctx, "add", json!({"a": 1, "b": 2}), vec![], || async {
            Ok(3)
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(ctx.event_count(), 1);
    }

    #[tokio::test]
    async fn failed_call_is_forwarded_and_recorded_as_failure() {
        let collector = crate::collector::Collector::new(
            EventStore::open_in_memory().unwrap(),
            CollectorConfig::default(),
        );
        let mut ctx = collector.observe("s1").await.unwrap();

        let result: Result<i32, String> =
            intercept(&mut ctx, "add", json!({}), vec![], || async { Err("boom".to_string()) }).await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(ctx.event_count(), 1);
    }
}
