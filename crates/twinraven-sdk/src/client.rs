use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};

use twinraven_core::Config;
use twinraven_engine::{Miner, Synthesizer, Validator, ValidatorConfig};
use twinraven_llm::LLMProvider;
use twinraven_runtime::export::{self, Span};
use twinraven_runtime::{Collector, DriftFlag, ObservationContext, ToolRegistry};
use twinraven_store::{CandidateStore, EventStore, RegistryStore};
use twinraven_types::{
    CandidateChain, Event, MiningConfig, RetirementReason, SynthesizedTool, ToolRecord, ToolState,
    ToolVersion, ValidationResult,
};

use crate::error::{Error, Result};

/// Embedding entry point: one `Client` owns a workspace directory's SQLite
/// stores and versioned tool documents, and exposes the full
/// observe → mine → synthesize → validate → register lifecycle.
pub struct Client {
    workspace_path: PathBuf,
    config: Config,
    event_store: Arc<StdMutex<EventStore>>,
    candidate_store: Arc<StdMutex<CandidateStore>>,
    collector: Collector,
    registry: Arc<ToolRegistry>,
    llm: Option<Arc<dyn LLMProvider>>,
}

impl Client {
    /// Opens (creating if absent) the SQLite stores and `tools/` directory
    /// under `workspace_path`, using default configuration.
    pub fn open(workspace_path: impl Into<PathBuf>) -> Result<Self> {
        ClientBuilder::new().workspace_path(workspace_path).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Opens a session-scoped write chain. See
    /// [`twinraven_runtime::Collector::observe`].
    pub async fn observe(&self, session_id: impl Into<String>) -> Result<ObservationContext> {
        self.collector.observe(session_id).await.map_err(Error::from)
    }

    /// Mines every recorded event for repeated tool-call chains and persists
    /// the discovered candidates.
    pub fn mine(&self, mining_config: &MiningConfig) -> Result<Vec<CandidateChain>> {
        let events = self
            .event_store
            .lock()
            .expect("event store mutex poisoned")
            .all_events()?;
        let candidates = Miner::mine(&events, mining_config)?;
        self.candidate_store
            .lock()
            .expect("candidate store mutex poisoned")
            .save_all(&candidates)?;
        Ok(candidates)
    }

    /// Candidates discovered since `since`, regardless of which mining run
    /// produced them.
    pub fn candidates_since(&self, since: DateTime<Utc>) -> Result<Vec<CandidateChain>> {
        self.candidate_store
            .lock()
            .expect("candidate store mutex poisoned")
            .list_since(since)
            .map_err(Error::from)
    }

    /// Synthesizes a composite tool from a candidate chain via the
    /// configured LLM provider. Returns `InvalidInput` if none was
    /// configured on the builder.
    pub async fn synthesize(
        &self,
        chain: &CandidateChain,
        samples: Vec<Vec<Event>>,
    ) -> Result<SynthesizedTool> {
        Synthesizer::check_failure_rate(chain, self.config.synthesis.max_failure_rate)
            .map_err(Error::from)?;
        let provider = self
            .llm
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no LLM provider configured".to_string()))?;
        Synthesizer::synthesize(
            chain,
            samples,
            provider.as_ref(),
            self.config.synthesis.max_parallel_steps,
        )
        .await
        .map_err(Error::from)
    }

    /// Offline-replays `sessions` against `tool`'s own step definitions and
    /// scores equivalence against the recorded events.
    pub fn validate(
        &self,
        tool: &SynthesizedTool,
        sessions: Vec<Vec<Event>>,
        config: &ValidatorConfig,
    ) -> Result<ValidationResult> {
        Validator::validate(tool, sessions, config).map_err(Error::from)
    }

    /// Registers an already-promoted tool as a new version.
    pub async fn register(
        &self,
        tool: &SynthesizedTool,
        validation: ValidationResult,
    ) -> Result<ToolRecord> {
        self.registry.register(tool, validation).await.map_err(Error::from)
    }

    pub fn get_tool(&self, slug: &str) -> Result<Option<ToolRecord>> {
        self.registry.get(slug).map_err(Error::from)
    }

    pub fn list_tools(&self, status: Option<ToolState>) -> Result<Vec<ToolRecord>> {
        self.registry.list(status).map_err(Error::from)
    }

    pub fn tool_version_history(&self, slug: &str) -> Result<Vec<ToolVersion>> {
        self.registry.version_history(slug).map_err(Error::from)
    }

    pub async fn retire_tool(&self, slug: &str, reason: RetirementReason) -> Result<()> {
        self.registry.retire(slug, reason).await.map_err(Error::from)
    }

    pub async fn staleness_scan(&self) -> Result<Vec<String>> {
        self.registry.staleness_scan().await.map_err(Error::from)
    }

    pub async fn failure_spike_scan(&self) -> Result<Vec<String>> {
        self.registry.failure_spike_scan().await.map_err(Error::from)
    }

    pub async fn drift_scan(&self, since: DateTime<Utc>) -> Result<Vec<DriftFlag>> {
        self.registry.drift_scan(since).await.map_err(Error::from)
    }

    /// Streams every recorded event to `path` as line-delimited JSON.
    pub fn export_ndjson(&self, path: &Path) -> Result<usize> {
        let events = self
            .event_store
            .lock()
            .expect("event store mutex poisoned")
            .all_events()?;
        export::export_ndjson(events, path).map_err(Error::from)
    }

    /// Streams every recorded event to `path` as batched columnar JSON.
    pub fn export_columnar(&self, path: &Path, batch_rows: Option<usize>) -> Result<usize> {
        let events = self
            .event_store
            .lock()
            .expect("event store mutex poisoned")
            .all_events()?;
        export::export_columnar(events, path, batch_rows).map_err(Error::from)
    }

    /// Every recorded event, converted to a trace span.
    pub fn spans(&self) -> Result<Vec<Span>> {
        let events = self
            .event_store
            .lock()
            .expect("event store mutex poisoned")
            .all_events()?;
        Ok(events.iter().map(export::event_to_span).collect())
    }
}

/// Builds a [`Client`] with an explicit workspace path, configuration, and
/// optional LLM provider.
pub struct ClientBuilder {
    workspace_path: Option<PathBuf>,
    config: Option<Config>,
    llm: Option<Arc<dyn LLMProvider>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            workspace_path: None,
            config: None,
            llm: None,
        }
    }

    pub fn workspace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_path = Some(path.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(provider);
        self
    }

    pub fn build(self) -> Result<Client> {
        let workspace_path = match self.workspace_path {
            Some(path) => path,
            None => twinraven_core::resolve_workspace_path(None)?,
        };
        std::fs::create_dir_all(&workspace_path).map_err(twinraven_core::Error::from)?;

        let config = self.config.unwrap_or_default();
        config.validate().map_err(Error::from)?;

        let events_db = workspace_path.join("events.sqlite3");
        let candidates_db = workspace_path.join("candidates.sqlite3");
        let registry_db = workspace_path.join("registry.sqlite3");
        let tools_dir = workspace_path.join("tools");

        let event_store = Arc::new(StdMutex::new(EventStore::open(&events_db)?));
        let candidate_store = Arc::new(StdMutex::new(CandidateStore::open(&candidates_db)?));
        let registry_store = RegistryStore::open(&registry_db)?;

        let mut collector = Collector::from_shared(event_store.clone(), config.collector.clone());
        if let Some(llm) = &self.llm {
            collector = collector.with_llm(llm.clone());
        }

        let registry = ToolRegistry::new(
            registry_store,
            event_store.clone(),
            config.registry.clone(),
            tools_dir,
        );

        Ok(Client {
            workspace_path,
            config,
            event_store,
            candidate_store,
            collector,
            registry: Arc::new(registry),
            llm: self.llm,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
