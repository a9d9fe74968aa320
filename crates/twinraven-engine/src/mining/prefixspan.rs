/// A frequent sequential pattern discovered in a set of tool-id sequences,
/// together with the indices of the input sequences it occurs in.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub tools: Vec<String>,
    pub sequence_indices: Vec<usize>,
}

/// A minimal PrefixSpan: finds sequential patterns (subsequences, not
/// necessarily contiguous) whose support — the fraction of sequences that
/// contain them — meets `min_support`, up to `max_length` items long.
///
/// `sequences` is a projected database: each entry pairs a suffix of tool ids
/// still available for extension with the original sequence index it came
/// from (so support is computed against the distinct original sequences, not
/// projected fragments).
pub fn mine(sequences: &[Vec<String>], min_support: f64, max_length: usize) -> Vec<Pattern> {
    if sequences.is_empty() || max_length == 0 {
        return Vec::new();
    }
    let total = sequences.len();
    let min_count = (min_support * total as f64).ceil().max(1.0) as usize;

    let projected: Vec<(usize, &[String])> = sequences
        .iter()
        .enumerate()
        .map(|(i, seq)| (i, seq.as_slice()))
        .collect();

    let mut patterns = Vec::new();
    grow(&[], &projected, min_count, max_length, &mut patterns);
    patterns
}

fn grow(
    prefix: &[String],
    projected: &[(usize, &[String])],
    min_count: usize,
    max_length: usize,
    out: &mut Vec<Pattern>,
) {
    if prefix.len() >= max_length {
        return;
    }

    use std::collections::HashMap;
    let mut candidates: HashMap<&str, Vec<usize>> = HashMap::new();
    for (seq_idx, suffix) in projected {
        let mut seen_in_seq: Vec<&str> = Vec::new();
        for item in suffix.iter() {
            if seen_in_seq.contains(&item.as_str()) {
                continue;
            }
            seen_in_seq.push(item.as_str());
            candidates.entry(item.as_str()).or_default().push(*seq_idx);
        }
    }

    for (item, occurrences) in candidates {
        if occurrences.len() < min_count {
            continue;
        }

        let mut extended_prefix = prefix.to_vec();
        extended_prefix.push(item.to_string());

        if extended_prefix.len() >= 2 {
            out.push(Pattern {
                tools: extended_prefix.clone(),
                sequence_indices: occurrences.clone(),
            });
        }

        let next_projected: Vec<(usize, &[String])> = projected
            .iter()
            .filter_map(|(seq_idx, suffix)| {
                suffix
                    .iter()
                    .position(|t| t == item)
                    .map(|pos| (*seq_idx, &suffix[pos + 1..]))
            })
            .collect();

        if !next_projected.is_empty() {
            grow(&extended_prefix, &next_projected, min_count, max_length, out);
        }
    }
}
