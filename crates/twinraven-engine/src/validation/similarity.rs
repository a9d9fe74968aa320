use std::collections::HashMap;

use serde_json::Value;
use twinraven_types::SimilarityMethod;

/// Scores how similar two JSON values are, using the requested method.
/// `ExactMatch` is a binary 0.0/1.0; `CosineTfidf` tokenizes each value's
/// string rendering on whitespace and compares term-frequency vectors.
pub fn score(method: SimilarityMethod, expected: &Value, actual: &Value) -> f64 {
    match method {
        SimilarityMethod::ExactMatch => {
            if expected == actual {
                1.0
            } else {
                0.0
            }
        }
        SimilarityMethod::CosineTfidf => cosine_tfidf(&render(expected), &render(actual)),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in text.split_whitespace() {
        *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity between the raw term-frequency vectors of two strings.
/// Returns 1.0 when both are empty (vacuously identical).
fn cosine_tfidf(a: &str, b: &str) -> f64 {
    let freq_a = term_frequencies(a);
    let freq_b = term_frequencies(b);

    if freq_a.is_empty() && freq_b.is_empty() {
        return 1.0;
    }

    let dot: f64 = freq_a
        .iter()
        .map(|(term, count)| count * freq_b.get(term).copied().unwrap_or(0.0))
        .sum();
    let norm_a: f64 = freq_a.values().map(|c| c * c).sum::<f64>().sqrt();
    let norm_b: f64 = freq_b.values().map(|c| c * c).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
