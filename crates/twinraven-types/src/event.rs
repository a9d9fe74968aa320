use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Globally unique event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic 64-bit canonicalized-input hash, rendered as 16 hex characters
/// at storage boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputHash(pub u64);

impl InputHash {
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for InputHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Partial => "partial",
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            "partial" => Ok(Outcome::Partial),
            other => Err(format!("unknown outcome: {}", other)),
        }
    }
}

/// A record of one tool call within a session.
///
/// Written once by the Collector; the only permitted mutation after write is the
/// `successor` backfill. Deleted only by the retention pruner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub session_id: String,
    pub tool_id: String,
    pub input_hash: InputHash,
    pub input_params: Value,
    pub output_summary: Option<String>,
    pub predecessor: Option<EventId>,
    pub successor: Option<EventId>,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: i32,
    pub outcome: Outcome,
    pub tags: Vec<String>,
}

impl Event {
    /// Execution duration must be non-negative.
    pub fn is_latency_valid(&self) -> bool {
        self.latency_ms >= 0
    }
}
