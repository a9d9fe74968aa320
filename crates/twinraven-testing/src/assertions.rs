//! Readable assertions for the shapes TwinRaven's tests most often check:
//! mined candidates, tool lifecycle state, and validation outcomes.

use anyhow::{bail, Result};

use twinraven_types::{CandidateChain, ToolRecord, ToolState, ValidationResult};

/// Asserts `candidates` contains a chain whose `tools` matches `expected`
/// exactly (order-sensitive — chains are sequences, not sets).
pub fn assert_contains_chain(candidates: &[CandidateChain], expected: &[&str]) -> Result<()> {
    let found = candidates.iter().any(|c| {
        c.tools.len() == expected.len() && c.tools.iter().zip(expected).all(|(a, b)| a == b)
    });
    if !found {
        bail!(
            "expected a candidate chain {:?} among {} mined candidates",
            expected,
            candidates.len()
        );
    }
    Ok(())
}

/// Asserts no candidate chain in `candidates` has support below `min_support`.
pub fn assert_min_support(candidates: &[CandidateChain], min_support: f64) -> Result<()> {
    for chain in candidates {
        if chain.support < min_support {
            bail!(
                "chain {:?} has support {} below minimum {}",
                chain.tools,
                chain.support,
                min_support
            );
        }
    }
    Ok(())
}

/// Asserts `record` is in the promoted state (no retirement reason set).
pub fn assert_promoted(record: &ToolRecord) -> Result<()> {
    if let Some(reason) = record.retirement_reason {
        bail!("expected {} to be promoted, but it was retired: {:?}", record.slug, reason);
    }
    Ok(())
}

/// Asserts `record` was retired for `expected`.
pub fn assert_retired_for(record: &ToolRecord, expected: twinraven_types::RetirementReason) -> Result<()> {
    match record.retirement_reason {
        Some(reason) if reason == expected => Ok(()),
        Some(other) => bail!("{} was retired for {:?}, expected {:?}", record.slug, other, expected),
        None => bail!("{} is still promoted, expected it retired for {:?}", record.slug, expected),
    }
}

/// Asserts a validation run passed with mean equivalence at or above
/// `min_mean`.
pub fn assert_validation_passed(result: &ValidationResult, min_mean: f64) -> Result<()> {
    if !result.pass {
        bail!(
            "validation for {} v{} failed: {:?}",
            result.tool_slug,
            result.tool_version,
            result.failure_reasons
        );
    }
    if result.equivalence.mean < min_mean {
        bail!(
            "validation for {} v{} has mean equivalence {} below {}",
            result.tool_slug,
            result.tool_version,
            result.equivalence.mean,
            min_mean
        );
    }
    Ok(())
}

/// Asserts `state` is one a registered tool (rather than a draft/testing
/// proposal) can be in.
pub fn assert_registrable_state(state: ToolState) -> Result<()> {
    if state != ToolState::Promoted {
        bail!("only promoted tools may be registered, got {:?}", state);
    }
    Ok(())
}
