use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::error::{Error, Result};

/// Pattern-mining algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningAlgorithm {
    Prefixspan,
    Gsp,
}

/// Snapshot of the parameters that produced a `CandidateChain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub algorithm: MiningAlgorithm,
    pub min_support: f64,
    pub min_confidence: f64,
    pub max_chain_length: usize,
    pub time_window_seconds: u64,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub session_ids: Option<Vec<String>>,
    pub collapse_repeats: bool,
    pub max_sample_events: usize,
    pub subsumption_threshold: f64,
    pub sample_rate: f64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            algorithm: MiningAlgorithm::Prefixspan,
            min_support: 0.1,
            min_confidence: 0.5,
            max_chain_length: 8,
            time_window_seconds: 300,
            since: None,
            until: None,
            session_ids: None,
            collapse_repeats: true,
            max_sample_events: 10,
            subsumption_threshold: 0.1,
            sample_rate: 1.0,
        }
    }
}

impl MiningConfig {
    /// Validates that every ratio and bound is in range. Called before any store
    /// access so an invalid config never touches the EventStore.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_support) {
            return Err(format!("min_support out of range: {}", self.min_support));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!(
                "min_confidence out of range: {}",
                self.min_confidence
            ));
        }
        if self.max_chain_length < 2 {
            return Err("max_chain_length must be >= 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.subsumption_threshold) {
            return Err(format!(
                "subsumption_threshold out of range: {}",
                self.subsumption_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(format!("sample_rate out of range: {}", self.sample_rate));
        }
        Ok(())
    }
}

/// An ordered sequence of at least two tool identifiers that recurs across
/// sessions. Immutable once constructed by the Miner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateChain {
    pub tools: Vec<String>,
    pub support: f64,
    pub confidence: f64,
    pub avg_latency_ms: f64,
    pub failure_rate: f64,
    pub sample_event_ids: Vec<EventId>,
    pub discovered_at: DateTime<Utc>,
    pub mining_config: MiningConfig,
}

impl CandidateChain {
    /// `2 <= len(tools) <= max_chain_length` and all ratio-valued fields are in
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.tools.len() < 2 {
            return Err(Error::InvalidValue(format!(
                "candidate chain must have at least 2 tools, got {}",
                self.tools.len()
            )));
        }
        if self.tools.len() > self.mining_config.max_chain_length {
            return Err(Error::InvalidValue(format!(
                "candidate chain length {} exceeds max_chain_length {}",
                self.tools.len(),
                self.mining_config.max_chain_length
            )));
        }
        for (name, value) in [
            ("support", self.support),
            ("confidence", self.confidence),
            ("failure_rate", self.failure_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidValue(format!(
                    "{} out of range [0,1]: {}",
                    name, value
                )));
            }
        }
        if self.sample_event_ids.len() > 10 {
            return Err(Error::InvalidValue(
                "sample_event_ids must hold at most 10 entries".to_string(),
            ));
        }
        Ok(())
    }
}
