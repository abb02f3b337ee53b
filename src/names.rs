use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A name reduced to its comparable form: lower-cased, accents stripped,
/// whitespace collapsed, split into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub joined: String,
    pub tokens: Vec<String>,
    pub first_token: String,
    pub last_token: String,
}

/// Lower-case, NFD-decompose and drop combining marks, collapse whitespace
/// runs, tokenize on spaces. Total: empty input yields an empty token list.
pub fn normalize(raw: &str) -> NormalizedName {
    let stripped: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let tokens: Vec<String> = stripped
        .split_whitespace()
        .map(|t| t.to_string())
        .collect();
    let joined = tokens.join(" ");
    let first_token = tokens.first().cloned().unwrap_or_default();
    let last_token = tokens.last().cloned().unwrap_or_default();

    NormalizedName {
        joined,
        tokens,
        first_token,
        last_token,
    }
}

/// Four-tier name similarity driving the duplicate-confirmation flow:
/// 1.0 identical, 0.9 confident subset, 0.75 ambiguous partial overlap,
/// 0.6 shared components without first-name agreement. Anything else falls
/// through to a token-overlap ratio, floored to 0.0 below 0.5.
///
/// Matched-token counting is containment against the other normalized name
/// string, so "Ramirez" still matches inside "Rivera-Ramirez"; the subset
/// check compares token sets exactly, which is what separates the 0.9 and
/// 0.75 tiers.
pub fn similarity(name_a: &str, name_b: &str) -> f64 {
    let a = normalize(name_a);
    let b = normalize(name_b);

    if a.joined == b.joined {
        return 1.0;
    }
    if a.tokens.is_empty() || b.tokens.is_empty() {
        return 0.0;
    }

    let mut matched: Vec<&str> = Vec::new();
    for tok in &a.tokens {
        if tok.len() > 1 && !matched.contains(&tok.as_str()) && b.joined.contains(tok.as_str()) {
            matched.push(tok);
        }
    }
    if matched.len() < 2 {
        return 0.0;
    }

    let first_name_match = a.first_token.len() > 1 && a.first_token == b.first_token;
    let non_first_match = matched.iter().any(|t| **t != a.first_token);

    if first_name_match && non_first_match {
        let a_subset_of_b = a.tokens.iter().all(|t| b.tokens.contains(t));
        let b_subset_of_a = b.tokens.iter().all(|t| a.tokens.contains(t));
        if a_subset_of_b || b_subset_of_a {
            return 0.9;
        }
        return 0.75;
    }

    if !first_name_match {
        return 0.6;
    }

    let component = matched.len() as f64 / a.tokens.len().max(b.tokens.len()) as f64;
    if component >= 0.5 {
        component
    } else {
        0.0
    }
}
