//! Graduate / undergraduate classification of program levels and
//! admissions-office names.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelCategory {
    Graduate,
    Undergraduate,
}

impl LevelCategory {
    pub fn opposite(&self) -> LevelCategory {
        match self {
            LevelCategory::Graduate => LevelCategory::Undergraduate,
            LevelCategory::Undergraduate => LevelCategory::Graduate,
        }
    }
}

/// Multi-word or unambiguous level phrases, matched as substrings.
/// Leftmost-longest matching keeps "UNDERGRADUATE CERTIFICATE" from also
/// counting as "GRADUATE CERTIFICATE".
const LEVEL_PHRASES: &[(&str, LevelCategory)] = &[
    ("UNDERGRADUATE CERTIFICATE", LevelCategory::Undergraduate),
    ("UNDERGRAD CERTIFICATE", LevelCategory::Undergraduate),
    ("UNDERGRAD CERT", LevelCategory::Undergraduate),
    ("UNDERGRADUATE", LevelCategory::Undergraduate),
    ("UNDERGRAD", LevelCategory::Undergraduate),
    ("BACHELORS", LevelCategory::Undergraduate),
    ("BACHELOR", LevelCategory::Undergraduate),
    ("ASSOCIATES", LevelCategory::Undergraduate),
    ("ASSOCIATE", LevelCategory::Undergraduate),
    ("DIPLOMA", LevelCategory::Undergraduate),
    ("GRADUATE CERTIFICATE", LevelCategory::Graduate),
    ("GRAD CERTIFICATE", LevelCategory::Graduate),
    ("GRAD CERT", LevelCategory::Graduate),
    ("POSTGRADUATE", LevelCategory::Graduate),
    ("POST-GRADUATE", LevelCategory::Graduate),
    ("POST GRADUATE", LevelCategory::Graduate),
    ("GRADUATE", LevelCategory::Graduate),
    ("MASTERS", LevelCategory::Graduate),
    ("MASTER", LevelCategory::Graduate),
    ("DOCTORATE", LevelCategory::Graduate),
    ("DOCTORAL", LevelCategory::Graduate),
    ("DOCTOR", LevelCategory::Graduate),
];

/// Degree abbreviations, matched only as whole tokens after dots are removed
/// ("M.S." → "MS"), so "MA" never fires inside "MATHEMATICS".
const LEVEL_ABBREVIATIONS: &[(&str, LevelCategory)] = &[
    ("MS", LevelCategory::Graduate),
    ("MA", LevelCategory::Graduate),
    ("MBA", LevelCategory::Graduate),
    ("MSC", LevelCategory::Graduate),
    ("MED", LevelCategory::Graduate),
    ("MFA", LevelCategory::Graduate),
    ("MPH", LevelCategory::Graduate),
    ("MSW", LevelCategory::Graduate),
    ("ME", LevelCategory::Graduate),
    ("MENG", LevelCategory::Graduate),
    ("LLM", LevelCategory::Graduate),
    ("PHD", LevelCategory::Graduate),
    ("EDD", LevelCategory::Graduate),
    ("DPHIL", LevelCategory::Graduate),
    ("DSC", LevelCategory::Graduate),
    ("DBA", LevelCategory::Graduate),
    ("JD", LevelCategory::Graduate),
    ("MD", LevelCategory::Graduate),
    ("GRAD", LevelCategory::Graduate),
    ("BS", LevelCategory::Undergraduate),
    ("BA", LevelCategory::Undergraduate),
    ("BSC", LevelCategory::Undergraduate),
    ("BED", LevelCategory::Undergraduate),
    ("BFA", LevelCategory::Undergraduate),
    ("BBA", LevelCategory::Undergraduate),
    ("BE", LevelCategory::Undergraduate),
    ("BENG", LevelCategory::Undergraduate),
    ("AS", LevelCategory::Undergraduate),
    ("AA", LevelCategory::Undergraduate),
    ("ASC", LevelCategory::Undergraduate),
    ("AAS", LevelCategory::Undergraduate),
];

fn phrase_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(LEVEL_PHRASES.iter().map(|(p, _)| *p))
            .expect("valid level phrases")
    })
}

/// Categories mentioned by `text`, in order of appearance.
fn categories_in(text: &str) -> Vec<LevelCategory> {
    let upper = text.to_uppercase();
    let mut found: Vec<LevelCategory> = phrase_matcher()
        .find_iter(&upper)
        .map(|m| LEVEL_PHRASES[m.pattern().as_usize()].1)
        .collect();

    let undotted = upper.replace('.', "");
    for token in undotted.split(|c: char| !c.is_ascii_alphanumeric()) {
        if let Some((_, cat)) = LEVEL_ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == token) {
            found.push(*cat);
        }
    }
    found
}

/// Classify a program level string. Graduate wins when both appear
/// ("Graduate Certificate for Bachelor's holders").
pub fn classify_level(level: &str) -> Option<LevelCategory> {
    let found = categories_in(level);
    if found.contains(&LevelCategory::Graduate) {
        Some(LevelCategory::Graduate)
    } else if found.contains(&LevelCategory::Undergraduate) {
        Some(LevelCategory::Undergraduate)
    } else {
        None
    }
}

/// Does an office name mention the graduate category? "Undergraduate" alone does not.
pub fn mentions_graduate(name: &str) -> bool {
    let upper = name.to_uppercase();
    let stripped = upper.replace("UNDERGRADUATE", " ").replace("UNDERGRAD", " ");
    stripped.contains("GRADUATE")
        || stripped
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|t| t == "GRAD")
}

pub fn mentions_undergraduate(name: &str) -> bool {
    name.to_uppercase().contains("UNDERGRAD")
}

pub fn mentions_category(name: &str, category: LevelCategory) -> bool {
    match category {
        LevelCategory::Graduate => mentions_graduate(name),
        LevelCategory::Undergraduate => mentions_undergraduate(name),
    }
}

/// A program of `category` must never be linked to an office naming the opposite category.
pub fn is_compatible(category: Option<LevelCategory>, department_name: &str) -> bool {
    match category {
        Some(cat) => !mentions_category(department_name, cat.opposite()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_level() {
        assert_eq!(classify_level("Master's"), Some(LevelCategory::Graduate));
        assert_eq!(classify_level("M.S."), Some(LevelCategory::Graduate));
        assert_eq!(classify_level("Ph.D."), Some(LevelCategory::Graduate));
        assert_eq!(classify_level("Graduate Certificate"), Some(LevelCategory::Graduate));
        assert_eq!(
            classify_level("Undergraduate Certificate"),
            Some(LevelCategory::Undergraduate)
        );
        assert_eq!(classify_level("Bachelor of Science in Mathematics"), Some(LevelCategory::Undergraduate));
        assert_eq!(classify_level("B.A."), Some(LevelCategory::Undergraduate));
        assert_eq!(classify_level("Associate"), Some(LevelCategory::Undergraduate));
        assert_eq!(classify_level("Diploma"), Some(LevelCategory::Undergraduate));
        assert_eq!(classify_level("Continuing education"), None);
        assert_eq!(classify_level(""), None);
    }

    #[test]
    fn test_office_mentions() {
        assert!(mentions_graduate("Office of Graduate Admissions"));
        assert!(mentions_graduate("grad admissions"));
        assert!(!mentions_graduate("Undergraduate Admissions"));
        assert!(!mentions_graduate("UNDERGRAD ADMISSIONS"));
        assert!(!mentions_graduate("Upgrade Services"));
        assert!(mentions_undergraduate("undergraduate admissions"));
        assert!(!mentions_undergraduate("Graduate Admissions"));
    }

    #[test]
    fn test_cross_category_compatibility() {
        let grad = Some(LevelCategory::Graduate);
        let ug = Some(LevelCategory::Undergraduate);
        assert!(!is_compatible(grad, "UNDERGRADUATE ADMISSIONS"));
        assert!(!is_compatible(grad, "undergraduate admissions"));
        assert!(is_compatible(grad, "Graduate Admissions"));
        assert!(!is_compatible(ug, "Graduate Admissions"));
        assert!(is_compatible(ug, "Undergraduate Admissions"));
        assert!(is_compatible(ug, "Admissions"));
        assert!(is_compatible(None, "Graduate Admissions"));
    }
}
