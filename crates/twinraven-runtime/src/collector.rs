use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;

use twinraven_core::CollectorConfig;
use twinraven_llm::{LLMProvider, LlmRequest};
use twinraven_store::EventStore;
use twinraven_types::{Event, EventId, Outcome};

use crate::error::{Error, Result};

/// How a `Collector` hands events to the store: one `append` per `record`, or
/// accumulated and flushed in batches.
#[derive(Debug, Clone)]
pub enum BufferMode {
    Immediate,
    Buffered { max_size: usize, max_age: Duration },
}

/// Opens scoped `ObservationContext`s against a shared `EventStore`.
pub struct Collector {
    store: Arc<Mutex<EventStore>>,
    llm: Option<Arc<dyn LLMProvider>>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(store: EventStore, config: CollectorConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            llm: None,
            config,
        }
    }

    /// Builds a `Collector` over a store handle shared with other components
    /// (a `ToolRegistry`'s scans, a reader), rather than one the `Collector`
    /// owns exclusively.
    pub fn from_shared(store: Arc<Mutex<EventStore>>, config: CollectorConfig) -> Self {
        Self {
            store,
            llm: None,
            config,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Opens a session-scoped write chain. Verifies store reachability with a
    /// bounded health check before returning the context; this is the only
    /// fatal precondition a caller must handle.
    pub async fn observe(&self, session_id: impl Into<String>) -> Result<ObservationContext> {
        health_check(self.store.clone()).await?;

        let buffer_mode = if self.config.buffered {
            BufferMode::Buffered {
                max_size: self.config.buffer_max_size,
                max_age: Duration::from_secs(self.config.buffer_max_age_secs),
            }
        } else {
            BufferMode::Immediate
        };

        Ok(ObservationContext {
            store: self.store.clone(),
            llm: self.llm.clone(),
            config: self.config.clone(),
            buffer_mode,
            session_id: session_id.into(),
            previous_event: None,
            event_count: 0,
            buffer: Vec::new(),
            buffer_opened_at: None,
        })
    }
}

async fn health_check(store: Arc<Mutex<EventStore>>) -> Result<()> {
    let probe = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || {
            let guard = store.lock().expect("event store mutex poisoned");
            guard.count()
        }),
    )
    .await
    .map_err(|_| Error::NotInitialized("event store health check timed out".to_string()))?
    .map_err(|_| Error::NotInitialized("event store health check task panicked".to_string()))?;

    probe.map(|_| ()).map_err(Error::from)
}

/// A single mutable write chain for one logical agent session. Not shared
/// across concurrent tasks: it owns the one `previous_event` pointer that
/// every `record` call advances.
pub struct ObservationContext {
    store: Arc<Mutex<EventStore>>,
    llm: Option<Arc<dyn LLMProvider>>,
    config: CollectorConfig,
    buffer_mode: BufferMode,
    session_id: String,
    previous_event: Option<EventId>,
    event_count: u64,
    buffer: Vec<Event>,
    buffer_opened_at: Option<Instant>,
}

impl ObservationContext {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub async fn record(
        &mut self,
        tool_id: impl Into<String>,
        inputs: Value,
        output: Value,
        outcome: Outcome,
        tags: Vec<String>,
        latency_ms: i32,
    ) -> Result<EventId> {
        let summary = self.build_output_summary(&output).await;
        self.commit(tool_id.into(), inputs, summary, outcome, tags, latency_ms)
            .await
    }

    pub async fn record_failure(
        &mut self,
        tool_id: impl Into<String>,
        inputs: Value,
        error: impl Into<String>,
        tags: Vec<String>,
        latency_ms: i32,
    ) -> Result<EventId> {
        self.commit(
            tool_id.into(),
            inputs,
            Some(error.into()),
            Outcome::Failure,
            tags,
            latency_ms,
        )
        .await
    }

    /// Flushes any buffered events. Safe to call repeatedly; a no-op once the
    /// buffer is empty.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        self.buffer_opened_at = None;

        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = store.lock().expect("event store mutex poisoned");
            guard.append_batch(&batch)
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "buffered flush failed, dropping batch");
                Ok(())
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "buffered flush task panicked, dropping batch");
                Ok(())
            }
        }
    }

    /// Flushes remaining buffered events and logs the session summary. Any
    /// error here is not suppressed; events already written remain durable.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await?;
        tracing::info!(
            session_id = %self.session_id,
            events = self.event_count,
            "observation context closed"
        );
        Ok(())
    }

    async fn build_output_summary(&self, output: &Value) -> Option<String> {
        let rendered = twinraven_core::canonical_string(output);
        if !self.config.compression_enabled || rendered.len() <= self.config.max_output_length {
            return Some(rendered);
        }

        if let Some(llm) = &self.llm {
            let request = LlmRequest {
                prompt: format!(
                    "Summarize the following tool output in under {} characters:\n{}",
                    self.config.max_output_length, rendered
                ),
                response_schema: None,
                max_tokens: 256,
                temperature: 0.0,
            };
            match llm.generate(request).await {
                Ok(response) => return Some(response.content),
                Err(err) => {
                    tracing::warn!(error = %err, "summarization call failed, falling back to truncation");
                }
            }
        }

        let mut truncated = rendered;
        truncated.truncate(self.config.max_output_length);
        truncated.push_str(" …[truncated]");
        Some(truncated)
    }

    async fn commit(
        &mut self,
        tool_id: String,
        inputs: Value,
        output_summary: Option<String>,
        outcome: Outcome,
        tags: Vec<String>,
        latency_ms: i32,
    ) -> Result<EventId> {
        let input_hash = twinraven_core::input_hash(&inputs);
        let id = EventId::new();
        let event = Event {
            id,
            session_id: self.session_id.clone(),
            tool_id,
            input_hash,
            input_params: inputs,
            output_summary,
            predecessor: self.previous_event,
            successor: None,
            timestamp: Utc::now(),
            latency_ms,
            outcome,
            tags,
        };

        let buffer_mode = self.buffer_mode.clone();
        match buffer_mode {
            BufferMode::Immediate => {
                let store = self.store.clone();
                let to_append = event.clone();
                let append_result = tokio::task::spawn_blocking(move || {
                    let guard = store.lock().expect("event store mutex poisoned");
                    guard.append(&to_append)
                })
                .await;
                // A store append failure never propagates once a context is
                // open: the event is dropped and the session continues. The
                // caller still gets `id` back, but since nothing was
                // persisted the predecessor/successor chain skips over it.
                match append_result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::error!(error = %err, "event append failed, dropping event");
                        return Ok(id);
                    }
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "event append task panicked, dropping event");
                        return Ok(id);
                    }
                }
                if let Some(prev) = self.previous_event {
                    self.backfill_successor(prev, id).await;
                }
            }
            BufferMode::Buffered { max_size, max_age } => {
                if let Some(prev) = self.previous_event {
                    if let Some(prev_event) = self.buffer.iter_mut().find(|e| e.id == prev) {
                        prev_event.successor = Some(id);
                    }
                }
                if self.buffer.is_empty() {
                    self.buffer_opened_at = Some(Instant::now());
                }
                self.buffer.push(event);

                let age_exceeded = self
                    .buffer_opened_at
                    .map(|opened| opened.elapsed() >= max_age)
                    .unwrap_or(false);
                if self.buffer.len() >= max_size || age_exceeded {
                    self.flush().await?;
                }
            }
        }

        self.previous_event = Some(id);
        self.event_count += 1;
        Ok(id)
    }

    async fn backfill_successor(&self, predecessor: EventId, successor: EventId) {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = store.lock().expect("event store mutex poisoned");
            guard.update_successor(predecessor, successor)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "successor backfill failed, continuing with a chain gap");
            }
            Err(join_err) => {
                tracing::warn!(error = %join_err, "successor backfill task panicked, continuing with a chain gap");
            }
        }
    }
}
