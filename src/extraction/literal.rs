use crate::extraction::schema::schema;
use crate::types::{EntityKind, FieldMap};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const MAX_VALUE_CHARS: usize = 200;

/// Compiled `label [is|are|=|:|-|–] value` patterns, per entity, in schema order.
type LabelPatterns = Vec<(String, Vec<(String, Regex)>)>;

fn label_patterns(kind: EntityKind) -> &'static LabelPatterns {
    static CACHE: OnceLock<HashMap<EntityKind, LabelPatterns>> = OnceLock::new();
    let all = CACHE.get_or_init(|| {
        EntityKind::ALL
            .iter()
            .map(|k| (*k, compile_patterns(*k)))
            .collect()
    });
    // every kind is inserted above
    &all[&kind]
}

fn compile_patterns(kind: EntityKind) -> LabelPatterns {
    schema(kind)
        .field_labels()
        .iter()
        .map(|(field, labels)| {
            let compiled = labels
                .iter()
                .filter_map(|label| {
                    let pattern = format!(
                        r"(?i)\b{}\s*(?:is|are|=|:|-|–)?\s*(?P<value>.*)",
                        regex::escape(label)
                    );
                    Regex::new(&pattern).ok().map(|re| (label.clone(), re))
                })
                .collect();
            (field.clone(), compiled)
        })
        .collect()
}

/// Trim, keep the part before any `•` or ` | `, drop trailing `.,;`, cap at 200 chars.
pub fn clean_literal_value(value: &str) -> String {
    let mut v = value.trim();
    if let Some((head, _)) = v.split_once('•') {
        v = head.trim();
    }
    if let Some((head, _)) = v.split_once(" | ") {
        v = head.trim();
    }
    let v = v.trim_end_matches(['.', ',', ';']).trim();
    if v.chars().count() > MAX_VALUE_CHARS {
        let cut: String = v.chars().take(MAX_VALUE_CHARS).collect();
        format!("{}...", cut.trim_end())
    } else {
        v.to_string()
    }
}

/// Scan `text` line by line for `Label: value` pairs of the given entity.
///
/// Each line fills at most one field (the first in schema order whose label
/// matches) and each field keeps its first value. A line that is only the
/// label (optionally with a trailing colon) takes its value from the next line.
pub fn extract_literal_fields(text: &str, kind: EntityKind) -> FieldMap {
    let patterns = label_patterns(kind);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut found = FieldMap::new();
    for (idx, line) in lines.iter().enumerate() {
        'fields: for (field, labels) in patterns {
            if found.contains_key(field) {
                continue;
            }
            for (label, re) in labels {
                let Some(caps) = re.captures(line) else {
                    continue;
                };
                let mut value = caps
                    .name("value")
                    .map(|m| clean_literal_value(m.as_str()))
                    .unwrap_or_default();
                if value.is_empty() {
                    let bare = line.trim_end_matches(':').trim();
                    if bare.eq_ignore_ascii_case(label) {
                        if let Some(next) = lines.get(idx + 1) {
                            value = clean_literal_value(next);
                        }
                    }
                }
                if !value.is_empty() {
                    found.insert(field.clone(), value);
                    break 'fields;
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_and_email_lines() {
        let fields = extract_literal_fields(
            "Phone: (555) 123-4567\nEmail: admissions@example.edu",
            EntityKind::College,
        );
        assert_eq!(fields.get("Phone").map(String::as_str), Some("(555) 123-4567"));
        assert_eq!(
            fields.get("Email").map(String::as_str),
            Some("admissions@example.edu")
        );
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_label_on_its_own_line() {
        let fields = extract_literal_fields(
            "Application Fee:\n$75 • waived for veterans\nother text",
            EntityKind::College,
        );
        assert_eq!(fields.get("ApplicationFees").map(String::as_str), Some("$75"));
    }

    #[test]
    fn test_synonyms_and_first_value_wins() {
        let fields = extract_literal_fields(
            "Total Enrollment: 12,000.\nTotal Enrollment: 9,000",
            EntityKind::College,
        );
        assert_eq!(
            fields.get("TotalStudentsEnrolled").map(String::as_str),
            Some("12,000")
        );
    }

    #[test]
    fn test_entity_specific_labels() {
        let text = "Department Name: Graduate Admissions\nPhone Number: 555-000-1111";
        let dept = extract_literal_fields(text, EntityKind::Department);
        assert_eq!(
            dept.get("DepartmentName").map(String::as_str),
            Some("Graduate Admissions")
        );
        assert_eq!(dept.get("PhoneNumber").map(String::as_str), Some("555-000-1111"));
        let program = extract_literal_fields(text, EntityKind::Program);
        assert!(!program.contains_key("PhoneNumber"));
        assert!(!program.contains_key("DepartmentName"));
    }

    #[test]
    fn test_clean_value_caps_length() {
        let long = "x".repeat(250);
        let cleaned = clean_literal_value(&long);
        assert_eq!(cleaned.chars().count(), 203);
        assert!(cleaned.ends_with("..."));
        assert_eq!(clean_literal_value(" a | b "), "a");
    }
}
