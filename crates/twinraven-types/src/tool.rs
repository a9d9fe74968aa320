use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::candidate::CandidateChain;
use crate::error::{Error, Result};

/// Lifecycle state of a `SynthesizedTool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Draft,
    Testing,
    Promoted,
    Retired,
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolState::Draft => "draft",
            ToolState::Testing => "testing",
            ToolState::Promoted => "promoted",
            ToolState::Retired => "retired",
        };
        write!(f, "{}", s)
    }
}

impl ToolState {
    /// Allowed transitions: draft -> testing, testing -> draft, testing ->
    /// promoted, promoted -> retired. Retired is terminal.
    pub fn can_transition_to(self, next: ToolState) -> bool {
        matches!(
            (self, next),
            (ToolState::Draft, ToolState::Testing)
                | (ToolState::Testing, ToolState::Draft)
                | (ToolState::Testing, ToolState::Promoted)
                | (ToolState::Promoted, ToolState::Retired)
        )
    }
}

/// Reason a tool left the `promoted` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetirementReason {
    Manual,
    Unused,
    Drift,
    FailureSpike,
    Superseded,
}

/// Source of a value feeding a step's input mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// `parameters.<name>` — an external parameter of the composite tool.
    Parameter { name: String },
    /// `wiring.<stepIdx>.<field>` — an upstream step's output field.
    Wiring { step: usize, field: String },
    /// A literal constant baked into the tool definition.
    Constant { value: Value },
}

/// A restricted boolean predicate over `parameters.*`/`wiring.*` comparisons.
/// No function calls, no side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Eq { left: InputSource, right: InputSource },
    Ne { left: InputSource, right: InputSource },
    Gt { left: InputSource, right: InputSource },
    Lt { left: InputSource, right: InputSource },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Backoff shape for a per-step retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub base_delay_ms: u64,
}

/// Default behavior when no more specific error-handling clause applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBehavior {
    Retry,
    Skip,
    Abort,
}

/// Per-step error handling, derived by the Synthesizer from observed failure
/// patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepErrorPolicy {
    pub retry: Option<RetryPolicy>,
    /// Alternative step sequence to run if this step fails (a "skip fallback" or a
    /// genuine substitute chain).
    pub fallback: Option<Vec<usize>>,
    pub abort_conditions: Vec<Predicate>,
    pub default_behavior: DefaultBehavior,
}

impl Default for DefaultBehavior {
    fn default() -> Self {
        DefaultBehavior::Abort
    }
}

/// Composite error strategy for a `SynthesizedTool`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorStrategy {
    pub per_step: HashMap<usize, StepErrorPolicy>,
}

/// One step of a composite tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub index: usize,
    pub tool_id: String,
    pub input_mapping: HashMap<String, InputSource>,
    pub predicate: Option<Predicate>,
    pub parallelizable_with: Vec<usize>,
    pub timeout_ms: Option<u64>,
}

/// A synthesized composite tool proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedTool {
    pub slug: String,
    pub description: String,
    /// JSON Schema Draft 2020-12 describing the merged external parameters.
    pub parameters: Value,
    pub steps: Vec<StepDefinition>,
    pub error_strategy: ErrorStrategy,
    pub source_chain: CandidateChain,
    pub version: u32,
    pub state: ToolState,
    pub created_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
    pub retirement_reason: Option<RetirementReason>,
}

impl SynthesizedTool {
    /// Step indices are dense from 0, version >= 1.
    pub fn validate_structure(&self) -> Result<()> {
        if self.version < 1 {
            return Err(Error::InvalidValue("version must be >= 1".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.index != i {
                return Err(Error::InvalidValue(format!(
                    "step indices must be dense from 0, found {} at position {}",
                    step.index, i
                )));
            }
        }
        self.validate_parallel_acyclic()?;
        Ok(())
    }

    /// `parallelizable_with` induces no cycle in the dependency graph built
    /// from wiring sources: no two steps marked parallel may have an ancestor
    /// relationship.
    fn validate_parallel_acyclic(&self) -> Result<()> {
        let n = self.steps.len();
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
        for step in &self.steps {
            for source in step.input_mapping.values() {
                if let InputSource::Wiring { step: upstream, .. } = source {
                    if *upstream < n {
                        deps[step.index].push(*upstream);
                    }
                }
            }
        }

        let is_ancestor = |a: usize, b: usize, deps: &[Vec<usize>]| -> bool {
            // BFS from `a` following dependency edges to see if `b` is reachable.
            let mut stack = vec![a];
            let mut seen = vec![false; n];
            while let Some(cur) = stack.pop() {
                if seen[cur] {
                    continue;
                }
                seen[cur] = true;
                if cur == b {
                    return true;
                }
                for &d in &deps[cur] {
                    stack.push(d);
                }
            }
            false
        };

        for step in &self.steps {
            for &sibling in &step.parallelizable_with {
                if sibling >= n {
                    return Err(Error::InvalidValue(format!(
                        "parallelizable_with index {} out of bounds for step {}",
                        sibling, step.index
                    )));
                }
                if is_ancestor(step.index, sibling, &deps) || is_ancestor(sibling, step.index, &deps)
                {
                    return Err(Error::InvalidValue(format!(
                        "steps {} and {} cannot be parallel: one is a transitive ancestor of the other",
                        step.index, sibling
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::MiningConfig;

    fn source_chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 1.0,
            confidence: 1.0,
            avg_latency_ms: 100.0,
            failure_rate: 0.0,
            sample_event_ids: vec![],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    fn base_tool() -> SynthesizedTool {
        SynthesizedTool {
            slug: "search-read".into(),
            description: "search then read".into(),
            parameters: Value::Object(Default::default()),
            steps: vec![
                StepDefinition {
                    index: 0,
                    tool_id: "search".into(),
                    input_mapping: HashMap::new(),
                    predicate: None,
                    parallelizable_with: vec![],
                    timeout_ms: None,
                },
                StepDefinition {
                    index: 1,
                    tool_id: "read".into(),
                    input_mapping: HashMap::new(),
                    predicate: None,
                    parallelizable_with: vec![],
                    timeout_ms: None,
                },
            ],
            error_strategy: ErrorStrategy::default(),
            source_chain: source_chain(),
            version: 1,
            state: ToolState::Draft,
            created_at: Utc::now(),
            promoted_at: None,
            retired_at: None,
            retirement_reason: None,
        }
    }

    #[test]
    fn valid_tool_passes() {
        assert!(base_tool().validate_structure().is_ok());
    }

    #[test]
    fn sparse_step_indices_rejected() {
        let mut t = base_tool();
        t.steps[1].index = 5;
        assert!(t.validate_structure().is_err());
    }

    #[test]
    fn retired_is_terminal() {
        assert!(!ToolState::Retired.can_transition_to(ToolState::Promoted));
        assert!(!ToolState::Retired.can_transition_to(ToolState::Draft));
    }

    #[test]
    fn draft_to_promoted_directly_is_illegal() {
        assert!(!ToolState::Draft.can_transition_to(ToolState::Promoted));
    }

    #[test]
    fn ancestor_steps_cannot_be_parallel() {
        let mut t = base_tool();
        t.steps[1]
            .input_mapping
            .insert("q".into(), InputSource::Wiring { step: 0, field: "out".into() });
        t.steps[0].parallelizable_with = vec![1];
        assert!(t.validate_structure().is_err());
    }
}
