//! Fuzzy string scoring on a 0-100 scale.
//!
//! `weighted_ratio` picks the best of several views of the two strings:
//! - whole-string ratio
//! - token-sort and token-set ratios (word order and repeated words ignored)
//! - partial (best window) ratios when one string is much longer than the other
//!
//! Token and partial views are discounted so a direct match always wins ties.

use crate::reference::LookupTable;

/// Discount applied to token-based views.
const TOKEN_SCALE: f64 = 0.95;

/// Length ratio at which partial views are considered.
const PARTIAL_LENGTH_RATIO: f64 = 1.5;

/// Length ratio at which partial views are discounted further.
const LONG_PARTIAL_LENGTH_RATIO: f64 = 8.0;

const PARTIAL_SCALE: f64 = 0.9;
const LONG_PARTIAL_SCALE: f64 = 0.6;

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Normalized Indel similarity (0.0 - 1.0): insertions and deletions only,
/// so a substitution costs two edits.
fn indel_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Lowercase, replace non-alphanumerics with spaces, collapse whitespace.
pub fn preprocess(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain similarity of two strings (0 - 100).
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    indel_similarity(a, b) * 100.0
}

/// Best ratio of the shorter string against every same-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    let long_chars: Vec<char> = long.chars().collect();
    if short_len == 0 || short_len == long_chars.len() {
        return ratio(short, long);
    }

    let mut best = 0.0_f64;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        let score = ratio(short, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Ratio after sorting the words of each string.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn partial_token_sort_ratio(a: &str, b: &str) -> f64 {
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Compare the shared words against each side's shared-plus-remaining words.
fn token_set_with(a: &str, b: &str, scorer: fn(&str, &str) -> f64) -> f64 {
    let mut left: Vec<&str> = a.split_whitespace().collect();
    let mut right: Vec<&str> = b.split_whitespace().collect();
    left.sort_unstable();
    left.dedup();
    right.sort_unstable();
    right.dedup();

    let common: Vec<&str> = left.iter().filter(|t| right.contains(t)).copied().collect();
    let only_left: Vec<&str> = left.iter().filter(|t| !right.contains(t)).copied().collect();
    let only_right: Vec<&str> = right.iter().filter(|t| !left.contains(t)).copied().collect();

    let base = common.join(" ");
    let join = |rest: &[&str]| {
        if rest.is_empty() {
            base.clone()
        } else if base.is_empty() {
            rest.join(" ")
        } else {
            format!("{} {}", base, rest.join(" "))
        }
    };
    let combined_left = join(&only_left);
    let combined_right = join(&only_right);

    let mut best = scorer(&combined_left, &combined_right);
    if !base.is_empty() {
        best = best
            .max(scorer(&base, &combined_left))
            .max(scorer(&base, &combined_right));
    }
    best
}

/// Token-set ratio (0 - 100).
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, ratio)
}

fn partial_token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, partial_ratio)
}

/// Weighted best-of ratio between a query and a candidate (0 - 100).
pub fn weighted_ratio(query: &str, candidate: &str) -> f64 {
    let a = preprocess(query);
    let b = preprocess(candidate);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let base = ratio(&a, &b);

    let (len_a, len_b) = (a.chars().count() as f64, b.chars().count() as f64);
    let length_ratio = len_a.max(len_b) / len_a.min(len_b);

    if length_ratio < PARTIAL_LENGTH_RATIO {
        let token_sort = token_sort_ratio(&a, &b) * TOKEN_SCALE;
        let token_set = token_set_ratio(&a, &b) * TOKEN_SCALE;
        return base.max(token_sort).max(token_set);
    }

    let scale = if length_ratio >= LONG_PARTIAL_LENGTH_RATIO {
        LONG_PARTIAL_SCALE
    } else {
        PARTIAL_SCALE
    };
    let partial = partial_ratio(&a, &b) * scale;
    let partial_sort = partial_token_sort_ratio(&a, &b) * TOKEN_SCALE * scale;
    let partial_set = partial_token_set_ratio(&a, &b) * TOKEN_SCALE * scale;
    base.max(partial).max(partial_sort).max(partial_set)
}

/// Best-scoring table key for `query`, with its score.
///
/// Ties go to the earliest key in table order. `None` only for an empty table.
pub fn best_match<'t>(query: &str, table: &'t LookupTable) -> Option<(&'t str, &'t str, f64)> {
    let mut best: Option<(&str, &str, f64)> = None;
    for (key, value) in table.iter() {
        let score = weighted_ratio(query, key);
        match best {
            Some((_, _, top)) if score <= top => {}
            _ => best = Some((key, value, score)),
        }
    }
    best
}
