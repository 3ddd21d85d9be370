//! Ordered department-matching strategies for program linking.
//!
//! Every strategy is a pure function over the candidate pool. `match_department`
//! applies them in order and returns the first hit. Departments that name the
//! opposite level category are removed from the pool before any strategy runs.

use super::level::{classify_level, mentions_graduate, mentions_undergraduate, LevelCategory};
use super::store::CollegeDepartmentView;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Substring,
    Token,
    LevelInferred,
    GenericAdmissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentMatch {
    pub college_department_id: i64,
    pub name: String,
    pub strategy: MatchStrategy,
}

/// Level categories for which any plain "ADMISSIONS" office is an acceptable
/// last resort. Graduate programs are deliberately left unlinked instead.
pub const GENERIC_ADMISSIONS_FALLBACK: &[LevelCategory] = &[LevelCategory::Undergraduate];

const GRADUATE_OFFICE_PATTERNS: &[&str] = &[
    "GRADUATE ADMISSIONS",
    "GRADUATE SCHOOL ADMISSIONS",
    "OFFICE OF GRADUATE ADMISSIONS",
    "GRADUATE STUDIES ADMISSIONS",
    "GRADUATE PROGRAMS ADMISSIONS",
    "GRADUATE SCHOOL",
    "GRADUATE STUDIES",
    "GRADUATE PROGRAMS",
];

const UNDERGRADUATE_OFFICE_PATTERNS: &[&str] = &[
    "UNDERGRADUATE ADMISSIONS",
    "OFFICE OF UNDERGRADUATE ADMISSIONS",
    "UNDERGRADUATE STUDIES ADMISSIONS",
    "UNDERGRADUATE PROGRAMS ADMISSIONS",
    "UNDERGRADUATE STUDIES",
    "UNDERGRADUATE PROGRAMS",
];

const MIN_TOKEN_CHARS: usize = 4;

/// "School of Engineering - Graduate Admissions" → "Graduate Admissions";
/// drops a leading article.
pub fn clean_department_name(raw: &str) -> String {
    let mut name = raw.trim();
    for sep in [" — ", " – ", " - "] {
        if let Some((_, tail)) = name.rsplit_once(sep) {
            if !tail.trim().is_empty() {
                name = tail.trim();
            }
            break;
        }
    }
    let lower = name.to_lowercase();
    for article in ["the ", "a ", "an "] {
        if lower.starts_with(article) {
            if let Some(rest) = name.get(article.len()..) {
                return rest.trim().to_string();
            }
        }
    }
    name.to_string()
}

fn hit(dept: &CollegeDepartmentView, strategy: MatchStrategy) -> DepartmentMatch {
    DepartmentMatch {
        college_department_id: dept.college_department_id,
        name: dept.name.clone(),
        strategy,
    }
}

pub fn exact_match(name: &str, pool: &[&CollegeDepartmentView]) -> Option<DepartmentMatch> {
    let wanted = name.trim().to_lowercase();
    pool.iter()
        .find(|d| d.name.trim().to_lowercase() == wanted)
        .map(|d| hit(d, MatchStrategy::Exact))
}

pub fn substring_match(name: &str, pool: &[&CollegeDepartmentView]) -> Option<DepartmentMatch> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    pool.iter()
        .find(|d| {
            let have = d.name.trim().to_lowercase();
            !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
        })
        .map(|d| hit(d, MatchStrategy::Substring))
}

fn significant_tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

pub fn token_match(name: &str, pool: &[&CollegeDepartmentView]) -> Option<DepartmentMatch> {
    let tokens = significant_tokens(name);
    if tokens.is_empty() {
        return None;
    }
    pool.iter()
        .find(|d| {
            let have = significant_tokens(&d.name);
            tokens.iter().any(|t| have.contains(t))
        })
        .map(|d| hit(d, MatchStrategy::Token))
}

/// Admissions office for a level category: the named patterns in order, then any
/// office mentioning the category at all.
pub fn level_inferred_match(
    category: LevelCategory,
    pool: &[&CollegeDepartmentView],
) -> Option<DepartmentMatch> {
    let (patterns, mentions): (&[&str], fn(&str) -> bool) = match category {
        LevelCategory::Graduate => (GRADUATE_OFFICE_PATTERNS, mentions_graduate),
        LevelCategory::Undergraduate => (UNDERGRADUATE_OFFICE_PATTERNS, mentions_undergraduate),
    };
    for pattern in patterns {
        if let Some(d) = pool.iter().find(|d| d.name.to_uppercase().contains(pattern)) {
            return Some(hit(d, MatchStrategy::LevelInferred));
        }
    }
    pool.iter()
        .find(|d| mentions(&d.name))
        .map(|d| hit(d, MatchStrategy::LevelInferred))
}

pub fn generic_admissions_match(
    category: LevelCategory,
    pool: &[&CollegeDepartmentView],
) -> Option<DepartmentMatch> {
    if !GENERIC_ADMISSIONS_FALLBACK.contains(&category) {
        return None;
    }
    pool.iter()
        .find(|d| d.name.to_uppercase().contains("ADMISSIONS"))
        .map(|d| hit(d, MatchStrategy::GenericAdmissions))
}

/// College departments of `college_id` that a program of `category` may link to.
pub fn eligible_departments(
    college_id: i64,
    category: Option<LevelCategory>,
    pool: &[CollegeDepartmentView],
) -> Vec<&CollegeDepartmentView> {
    pool.iter()
        .filter(|d| d.college_id == college_id)
        .filter(|d| super::level::is_compatible(category, &d.name))
        .collect()
}

/// Pick the department a program should link to, trying exact, substring and
/// token matches on the program's department name, then the level-inferred
/// admissions office, then the generic admissions fallback.
pub fn match_department(
    college_id: i64,
    department_name: Option<&str>,
    level: Option<&str>,
    pool: &[CollegeDepartmentView],
) -> Option<DepartmentMatch> {
    let category = level.and_then(classify_level);
    let eligible = eligible_departments(college_id, category, pool);
    if eligible.is_empty() {
        return None;
    }

    if let Some(raw) = department_name {
        let name = clean_department_name(raw);
        if !name.is_empty() {
            let by_name = exact_match(&name, &eligible)
                .or_else(|| substring_match(&name, &eligible))
                .or_else(|| token_match(&name, &eligible));
            if by_name.is_some() {
                return by_name;
            }
        }
    }

    let category = category?;
    level_inferred_match(category, &eligible)
        .or_else(|| generic_admissions_match(category, &eligible))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(id: i64, college_id: i64, name: &str) -> CollegeDepartmentView {
        CollegeDepartmentView {
            college_department_id: id,
            college_id,
            department_id: id + 1000,
            name: name.to_string(),
        }
    }

    fn pool() -> Vec<CollegeDepartmentView> {
        vec![
            dept(1, 10, "UNDERGRADUATE ADMISSIONS"),
            dept(2, 10, "Office of Graduate Admissions"),
            dept(3, 10, "School of Engineering"),
            dept(4, 20, "Graduate Admissions"),
        ]
    }

    #[test]
    fn test_clean_department_name() {
        assert_eq!(clean_department_name("Engineering - Graduate Admissions"), "Graduate Admissions");
        assert_eq!(clean_department_name("The Graduate School"), "Graduate School");
        assert_eq!(clean_department_name("  Admissions "), "Admissions");
    }

    #[test]
    fn test_name_strategies_in_order() {
        let p = pool();
        let m = match_department(10, Some("school of engineering"), None, &p).unwrap();
        assert_eq!((m.college_department_id, m.strategy), (3, MatchStrategy::Exact));

        let m = match_department(10, Some("Engineering"), None, &p).unwrap();
        assert_eq!(m.strategy, MatchStrategy::Substring);

        let m = match_department(10, Some("Engineering Department Services"), None, &p).unwrap();
        assert_eq!((m.college_department_id, m.strategy), (3, MatchStrategy::Token));
    }

    #[test]
    fn test_level_inferred_respects_category() {
        let p = pool();
        let m = match_department(10, None, Some("Master's"), &p).unwrap();
        assert_eq!((m.college_department_id, m.strategy), (2, MatchStrategy::LevelInferred));

        let m = match_department(10, None, Some("Bachelor"), &p).unwrap();
        assert_eq!((m.college_department_id, m.strategy), (1, MatchStrategy::LevelInferred));
    }

    #[test]
    fn test_graduate_program_never_links_undergraduate_office() {
        let p = vec![dept(1, 10, "undergraduate admissions")];
        assert!(match_department(10, Some("Undergraduate Admissions"), Some("PhD"), &p).is_none());
        assert!(match_department(10, Some("Admissions"), Some("M.S."), &p).is_none());

        let p = vec![dept(1, 10, "Graduate Admissions")];
        assert!(match_department(10, Some("Graduate Admissions"), Some("Bachelor"), &p).is_none());
    }

    #[test]
    fn test_generic_admissions_only_for_undergraduate() {
        let p = vec![dept(1, 10, "Admissions Office")];
        let m = match_department(10, None, Some("Associate"), &p).unwrap();
        assert_eq!(m.strategy, MatchStrategy::GenericAdmissions);
        assert!(match_department(10, None, Some("Doctorate"), &p).is_none());
    }

    #[test]
    fn test_scoped_to_college() {
        let p = pool();
        assert!(match_department(30, Some("Graduate Admissions"), Some("MBA"), &p).is_none());
        let m = match_department(20, None, Some("MBA"), &p).unwrap();
        assert_eq!(m.college_department_id, 4);
    }
}
