//! Text normalization and fuzzy comparison helpers
//!
//! All comparisons in the matching engine run over normalized text:
//! lowercased, punctuation stripped, whitespace collapsed.

use regex::Regex;
use std::sync::OnceLock;

/// Filler words ignored when extracting title keywords
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "in", "on", "at", "to", "for",
];

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Lowercase, replace punctuation runs with single spaces, trim
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    non_alphanumeric()
        .replace_all(&lowered, " ")
        .trim()
        .to_string()
}

/// Normalized keywords of a title, stopwords removed
///
/// Falls back to all normalized words when stopword removal would leave
/// nothing (titles like "It" or "Of").
pub fn keywords(s: &str) -> Vec<String> {
    let normalized = normalize(s);
    let all: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
    let kept: Vec<String> = all
        .iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .cloned()
        .collect();
    if kept.is_empty() {
        all
    } else {
        kept
    }
}

/// Share of `query` keywords that also appear in `candidate`
pub fn keyword_overlap(query: &str, candidate: &str) -> f64 {
    let query_words = keywords(query);
    if query_words.is_empty() {
        return 0.0;
    }
    let candidate_words = keywords(candidate);
    let hits = query_words
        .iter()
        .filter(|w| candidate_words.contains(w))
        .count();
    hits as f64 / query_words.len() as f64
}

/// Whether the normalized forms are equal
pub fn eq_normalized(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// Whether one normalized form contains the other
pub fn contains_normalized(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("The Left Hand of Darkness!"), "the left hand of darkness");
        assert_eq!(normalize("  Dune:   Messiah  "), "dune messiah");
    }

    #[test]
    fn test_keywords_drop_stopwords() {
        assert_eq!(keywords("The Name of the Wind"), vec!["name", "wind"]);
    }

    #[test]
    fn test_keywords_fall_back_for_stopword_titles() {
        assert_eq!(keywords("The"), vec!["the"]);
    }

    #[test]
    fn test_keyword_overlap() {
        assert_eq!(keyword_overlap("Dune Messiah", "Dune Messiah"), 1.0);
        assert_eq!(keyword_overlap("Dune Messiah", "Dune"), 0.5);
        assert_eq!(keyword_overlap("Dune", "Neuromancer"), 0.0);
    }

    #[test]
    fn test_eq_and_contains_normalized() {
        assert!(eq_normalized("DUNE", "dune!"));
        assert!(!eq_normalized("", ""));
        assert!(contains_normalized("Ursula K. Le Guin", "le guin"));
        assert!(!contains_normalized("Herbert", "Gibson"));
    }
}
