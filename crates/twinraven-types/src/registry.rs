use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::RetirementReason;
use crate::validation::ValidationResult;

/// Registry wrapper row for a slug, backing the `tool_records` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub slug: String,
    pub current_version: u32,
    pub definition_path: String,
    pub registered_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub invocation_count: u64,
    pub retirement_reason: Option<RetirementReason>,
}

/// One versioned validation snapshot for a slug, backing the `tool_versions`
/// table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersion {
    pub slug: String,
    pub version: u32,
    pub validation: ValidationResult,
    pub created_at: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
}
