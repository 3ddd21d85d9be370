//! College name comparison used for reporting near-duplicates.
//!
//! Nothing here decides identity: finalize only treats an exact,
//! case-insensitive name as the same college. Similar names are surfaced to
//! the reviewer.

use super::store::CollegeRecord;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &["the", "university", "college", "of", "at", "in"];
const MIN_PARTIAL_CHARS: usize = 6;

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("non-word regex"))
}

/// Lowercase, drop filler words and punctuation, collapse whitespace.
/// "The University of M.I.T." → "mit".
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = non_word_re().replace_all(&lower, "");
    stripped
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NameComparison {
    pub exact: bool,
    pub normalized_match: bool,
    pub partial: bool,
}

impl NameComparison {
    pub fn is_similar(&self) -> bool {
        self.normalized_match || self.partial
    }
}

pub fn compare_names(extracted: &str, existing: &str) -> NameComparison {
    let exact = extracted.trim().to_lowercase() == existing.trim().to_lowercase();
    let a = normalize_name(extracted);
    let b = normalize_name(existing);
    let normalized_match = !a.is_empty() && a == b;
    let partial = a.chars().count() >= MIN_PARTIAL_CHARS
        && b.chars().count() >= MIN_PARTIAL_CHARS
        && (a.contains(&b) || b.contains(&a));
    NameComparison {
        exact,
        normalized_match,
        partial,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCollege {
    pub id: i64,
    pub name: String,
    pub comparison: NameComparison,
}

/// Existing colleges whose names resemble `name` without being an exact match.
pub fn similar_colleges(name: &str, colleges: &[CollegeRecord]) -> Vec<SimilarCollege> {
    colleges
        .iter()
        .filter_map(|c| {
            let comparison = compare_names(name, &c.name);
            (!comparison.exact && comparison.is_similar()).then(|| SimilarCollege {
                id: c.id,
                name: c.name.clone(),
                comparison,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldMap;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("M.I.T."), "mit");
        assert_eq!(normalize_name("The University of  Chicago"), "chicago");
        assert_eq!(normalize_name("Boston College"), "boston");
    }

    #[test]
    fn test_mit_is_similar_not_exact() {
        let cmp = compare_names("M.I.T.", "MIT");
        assert!(!cmp.exact);
        assert!(cmp.normalized_match);
        assert!(!cmp.partial);
        assert!(compare_names("mit", "MIT ").exact);
    }

    #[test]
    fn test_partial_needs_long_names() {
        assert!(compare_names("Stanford", "Stanford University Online").partial);
        assert!(!compare_names("Yale", "Yale Online").partial);
    }

    #[test]
    fn test_similar_colleges_skips_exact() {
        let colleges = vec![
            CollegeRecord {
                id: 1,
                name: "MIT".into(),
                fields: FieldMap::new(),
            },
            CollegeRecord {
                id: 2,
                name: "Harvard University".into(),
                fields: FieldMap::new(),
            },
        ];
        let similar = similar_colleges("M.I.T.", &colleges);
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].id, 1);
        assert!(similar_colleges("mit", &colleges).is_empty());
    }
}
