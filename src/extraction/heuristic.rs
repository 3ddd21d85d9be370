use crate::extraction::schema::schema;
use crate::types::{EntityKind, FieldMap};
use regex::Regex;
use std::sync::OnceLock;

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}").expect("phone regex")
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)]+").expect("url regex"))
}

fn ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+\s*:\s*\d+\b").expect("ratio regex"))
}

fn college_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][A-Za-z&.\s]{3,}\s(?:University|College))").expect("name regex")
    })
}

fn county_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z\s]+ County)\b").expect("county regex"))
}

const NUMBER_PREFIX: &str = r"(?:over|more than|about|approximately)?\s*([\d,]+)";

/// Count patterns, run against lowercased text. First match per field wins.
fn count_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"\s+(?:students\s+enrolled|enrolled\s+students)", "TotalStudentsEnrolled"),
            (r"(?:\s*\+?)?(?:\s+\w+){0,4}\s+students", "TotalStudents"),
            (r"\s+(?:graduate|grad)\s+students", "GradTotalStudents"),
            (r"\s+(?:undergraduate|ug)\s+students", "UGTotalStudents"),
            (r"\s+campuses", "NumberOfCampuses"),
            (r"\s+countries", "CountriesRepresented"),
        ]
        .into_iter()
        .filter_map(|(suffix, field)| {
            Regex::new(&format!("{}{}", NUMBER_PREFIX, suffix))
                .ok()
                .map(|re| (field, re))
        })
        .collect()
    })
}

/// Dollar-amount patterns; values are reported as `$N`.
fn money_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                r"\$(\d[\d,]*)\s+(?:per\s+year\s+)?graduate\s+tuition",
                "GradAvgTuition",
            ),
            (
                r"\$(\d[\d,]*)\s+(?:per\s+year\s+)?undergraduate\s+tuition",
                "UGAvgTuition",
            ),
            (r"\$(\d[\d,]*)\s+tuition", "TuitionFees"),
            (r"\$(\d[\d,]*)\s+application\s+fee", "ApplicationFees"),
        ]
        .into_iter()
        .filter_map(|(pattern, field)| Regex::new(pattern).ok().map(|re| (field, re)))
        .collect()
    })
}

fn set_default(fields: &mut FieldMap, field: &str, value: impl Into<String>) {
    if !fields.contains_key(field) {
        fields.insert(field.to_string(), value.into());
    }
}

fn clean_url(raw: &str) -> &str {
    raw.trim().trim_end_matches(['.', ',', ')', ';'])
}

fn classify_urls(text: &str, fields: &mut FieldMap) {
    for m in url_re().find_iter(text) {
        let url = clean_url(m.as_str());
        if url.is_empty() {
            continue;
        }
        let lower = url.to_ascii_lowercase();

        if lower.contains("financial") && lower.contains("aid") {
            set_default(fields, "FinancialAidUrl", url);
        }
        if lower.contains("admission") {
            set_default(fields, "AdmissionOfficeUrl", url);
        }
        if lower.contains("virtual") && lower.contains("tour") {
            set_default(fields, "VirtualTourUrl", url);
        }
        if lower.contains("facebook.com") {
            set_default(fields, "Facebook", url);
        }
        if lower.contains("instagram.com") {
            set_default(fields, "Instagram", url);
        }
        if lower.contains("twitter.com") || lower.contains("x.com") {
            set_default(fields, "Twitter", url);
        }
        if lower.contains("youtube.com") {
            set_default(fields, "Youtube", url);
        }
        if lower.contains("tiktok.com") {
            set_default(fields, "Tiktok", url);
        }
        if lower.contains("linkedin.com") {
            set_default(fields, "LinkedIn", url);
        }
        if lower.ends_with(".edu") || lower.ends_with(".edu/") || lower.contains(".edu/") {
            set_default(fields, "WebsiteUrl", url);
        }
    }
}

/// Pattern-based extraction over free text. Field names follow the college
/// schema; use [`project_heuristics_to_entity`] for the other kinds.
pub fn heuristic_extract_fields(text: &str) -> FieldMap {
    let mut fields = FieldMap::new();

    if let Some(m) = phone_re().find(text) {
        fields.insert("Phone".to_string(), m.as_str().trim().to_string());
    }

    let mut emails = email_re().find_iter(text).map(|m| m.as_str());
    if let Some(first) = emails.next() {
        fields.insert("Email".to_string(), first.to_string());
    }
    if let Some(second) = emails.next() {
        fields.insert("SecondaryEmail".to_string(), second.to_string());
    }

    classify_urls(text, &mut fields);

    if let Some(m) = ratio_re().find(text) {
        set_default(&mut fields, "Student_Faculty", m.as_str().trim());
    }

    let lower = text.to_lowercase();
    for (field, re) in count_patterns() {
        if let Some(caps) = re.captures(&lower) {
            set_default(&mut fields, field, &caps[1]);
        }
    }
    for (field, re) in money_patterns() {
        if let Some(caps) = re.captures(&lower) {
            set_default(&mut fields, field, format!("${}", &caps[1]));
        }
    }

    if let Some(caps) = college_name_re().captures(text) {
        set_default(&mut fields, "CollegeName", caps[1].trim());
    }
    if let Some(caps) = county_re().captures(text) {
        set_default(&mut fields, "County", caps[1].trim());
    }

    fields
}

/// Keep the fields `kind` owns, then fill its aliases from the remaining
/// heuristic output when the target is still empty.
pub fn project_heuristics_to_entity(fields: &FieldMap, kind: EntityKind) -> FieldMap {
    let entity = schema(kind);
    let mut projected: FieldMap = fields
        .iter()
        .filter(|(k, v)| entity.has_field(k) && !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (source, target) in entity.heuristic_aliases {
        let Some(value) = fields.get(*source).filter(|v| !v.is_empty()) else {
            continue;
        };
        if projected.get(*target).map(|v| v.is_empty()).unwrap_or(true) {
            projected.insert(target.to_string(), value.clone());
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contacts_and_urls() {
        let text = "Call +1 (617) 253-1000 or write to admissions@mit.edu and info@mit.edu.\n\
                    See https://mitadmissions.org/apply/ and https://www.facebook.com/MIT).\n\
                    Home: https://www.mit.edu/";
        let fields = heuristic_extract_fields(text);
        assert_eq!(fields.get("Phone").map(String::as_str), Some("+1 (617) 253-1000"));
        assert_eq!(fields.get("Email").map(String::as_str), Some("admissions@mit.edu"));
        assert_eq!(fields.get("SecondaryEmail").map(String::as_str), Some("info@mit.edu"));
        assert_eq!(
            fields.get("AdmissionOfficeUrl").map(String::as_str),
            Some("https://mitadmissions.org/apply/")
        );
        assert_eq!(
            fields.get("Facebook").map(String::as_str),
            Some("https://www.facebook.com/MIT")
        );
        assert_eq!(fields.get("WebsiteUrl").map(String::as_str), Some("https://www.mit.edu/"));
    }

    #[test]
    fn test_counts_and_money() {
        let text = "Home to more than 11,000 students enrolled from 130 countries.\n\
                    $59,750 tuition and a $75 application fee.\nStudent-faculty ratio 3:1";
        let fields = heuristic_extract_fields(text);
        assert_eq!(fields.get("TotalStudentsEnrolled").map(String::as_str), Some("11,000"));
        assert_eq!(fields.get("CountriesRepresented").map(String::as_str), Some("130"));
        assert_eq!(fields.get("TuitionFees").map(String::as_str), Some("$59,750"));
        assert_eq!(fields.get("ApplicationFees").map(String::as_str), Some("$75"));
        assert_eq!(fields.get("Student_Faculty").map(String::as_str), Some("3:1"));
    }

    #[test]
    fn test_name_and_county() {
        let fields = heuristic_extract_fields("Boston State University\nCampus: Suffolk County.");
        assert_eq!(
            fields.get("CollegeName").map(String::as_str),
            Some("Boston State University")
        );
        assert_eq!(fields.get("County").map(String::as_str), Some("Suffolk County"));
    }

    #[test]
    fn test_projection_applies_aliases() {
        let mut fields = FieldMap::new();
        fields.insert("Phone".into(), "555-111-2222".into());
        fields.insert("Email".into(), "grad@uni.edu".into());
        fields.insert("WebsiteUrl".into(), "https://uni.edu/".into());
        fields.insert("TuitionFees".into(), "$10".into());

        let dept = project_heuristics_to_entity(&fields, EntityKind::Department);
        assert_eq!(dept.get("PhoneNumber").map(String::as_str), Some("555-111-2222"));
        assert_eq!(dept.get("Email").map(String::as_str), Some("grad@uni.edu"));
        assert_eq!(dept.get("AdmissionUrl").map(String::as_str), Some("https://uni.edu/"));
        assert!(!dept.contains_key("TuitionFees"));

        let program = project_heuristics_to_entity(&fields, EntityKind::Program);
        assert_eq!(
            program.get("ProgramWebsiteURL").map(String::as_str),
            Some("https://uni.edu/")
        );
        assert!(program.get("Phone").is_none());
    }
}
