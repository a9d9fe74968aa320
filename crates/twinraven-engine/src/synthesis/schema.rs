use std::collections::HashMap;

use serde_json::Value;
use twinraven_types::{InputSource, Predicate};

/// Checks the LLM's raw JSON response against the fixed shape the Synthesizer's
/// own prompt requests. This is not a general JSON Schema engine: it only
/// knows the handful of fields TwinRaven itself asks for.
pub fn validate_proposal_shape(value: &Value) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    require_string(obj, "slug")?;
    require_string(obj, "description")?;

    let parameters = obj
        .get("parameters")
        .ok_or_else(|| "missing field `parameters`".to_string())?;
    if !parameters.is_object() {
        return Err("`parameters` must be a JSON Schema object".to_string());
    }

    let steps = obj
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing or non-array field `steps`".to_string())?;
    if steps.is_empty() {
        return Err("`steps` must contain at least one entry".to_string());
    }
    for (i, step) in steps.iter().enumerate() {
        let step_obj = step
            .as_object()
            .ok_or_else(|| format!("steps[{}] is not an object", i))?;
        require_string(step_obj, "tool_id").map_err(|e| format!("steps[{}]: {}", i, e))?;
        if !step_obj.contains_key("input_mapping") {
            return Err(format!("steps[{}] missing `input_mapping`", i));
        }
        if let Some(predicate) = step_obj.get("predicate") {
            if !predicate.is_null() && !predicate.is_object() {
                return Err(format!("steps[{}].predicate must be an object or null", i));
            }
        }
        if let Some(parallel) = step_obj.get("parallelizable_with") {
            if !parallel.is_null() && !parallel.is_array() {
                return Err(format!(
                    "steps[{}].parallelizable_with must be an array or null",
                    i
                ));
            }
        }
    }

    Ok(())
}

fn require_string(obj: &serde_json::Map<String, Value>, key: &str) -> Result<(), String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        Some(Value::String(_)) => Err(format!("`{}` must not be empty", key)),
        Some(_) => Err(format!("`{}` must be a string", key)),
        None => Err(format!("missing field `{}`", key)),
    }
}

/// Decodes a step's `input_mapping` into typed sources. A shape failure here
/// means the proposal used a `kind` or field this build doesn't recognize.
pub fn parse_input_mapping(value: &Value) -> Result<HashMap<String, InputSource>, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid `input_mapping`: {}", e))
}

pub fn parse_predicate(value: &Value) -> Result<Predicate, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid `predicate`: {}", e))
}

pub fn parse_parallelizable_with(value: &Value) -> Result<Vec<usize>, String> {
    serde_json::from_value(value.clone())
        .map_err(|e| format!("invalid `parallelizable_with`: {}", e))
}

/// A step's wiring may only reach into earlier steps: no self-reference, no
/// forward reference to a step the chain hasn't run yet.
pub fn validate_wiring_references(
    step_index: usize,
    input_mapping: &HashMap<String, InputSource>,
) -> Result<(), String> {
    for (key, source) in input_mapping {
        if let InputSource::Wiring { step, .. } = source {
            if *step >= step_index {
                return Err(format!(
                    "step {} input `{}` wires from step {}, which is not an earlier step",
                    step_index, key, step
                ));
            }
        }
    }
    Ok(())
}

/// The predicate grammar is already restricted by the `Predicate` type itself
/// (comparisons and boolean combinators only, no function calls). The one
/// thing left to check is that it obeys the same earlier-steps-only wiring
/// rule as `input_mapping`.
pub fn validate_predicate(step_index: usize, predicate: &Predicate) -> Result<(), String> {
    match predicate {
        Predicate::Eq { left, right }
        | Predicate::Ne { left, right }
        | Predicate::Gt { left, right }
        | Predicate::Lt { left, right } => {
            validate_predicate_source(step_index, left)?;
            validate_predicate_source(step_index, right)
        }
        Predicate::And(parts) | Predicate::Or(parts) => parts
            .iter()
            .try_for_each(|p| validate_predicate(step_index, p)),
        Predicate::Not(inner) => validate_predicate(step_index, inner),
    }
}

fn validate_predicate_source(step_index: usize, source: &InputSource) -> Result<(), String> {
    if let InputSource::Wiring { step, .. } = source {
        if *step >= step_index {
            return Err(format!(
                "step {} predicate references step {}, which is not an earlier step",
                step_index, step
            ));
        }
    }
    Ok(())
}
