use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Similarity method used for equivalence scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    ExactMatch,
    CosineTfidf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceScore {
    pub mean: f64,
    pub min: f64,
    pub method: SimilarityMethod,
    pub threshold: f64,
}

/// Outcome of one offline replay validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: uuid::Uuid,
    pub tool_slug: String,
    pub tool_version: u32,
    pub sessions_replayed: usize,
    pub equivalence: EquivalenceScore,
    pub error_parity: bool,
    pub latency_ratio: f64,
    pub pass: bool,
    pub failure_reasons: Vec<String>,
    pub validated_at: DateTime<Utc>,
}
