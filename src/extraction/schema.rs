//! Static per-entity descriptors.
//!
//! Every pipeline stage (literal labels, heuristic projection, LLM prompts,
//! candidate resolution, finalize) looks entity kinds up here instead of
//! branching on the kind itself.

use crate::types::EntityKind;
use indexmap::IndexMap;
use std::sync::OnceLock;

pub const COLLEGE_FIELD_NAMES: &[&str] = &[
    "CollegeName",
    "LogoPath",
    "Phone",
    "Email",
    "SecondaryEmail",
    "Street1",
    "Street2",
    "County",
    "City",
    "State",
    "Country",
    "ZipCode",
    "WebsiteUrl",
    "AdmissionOfficeUrl",
    "VirtualTourUrl",
    "Facebook",
    "Instagram",
    "Twitter",
    "Youtube",
    "Tiktok",
    "ApplicationFees",
    "TestPolicy",
    "CoursesAndGrades",
    "Recommendations",
    "PersonalEssay",
    "WritingSample",
    "FinancialAidUrl",
    "AdditionalInformation",
    "AdditionalDeadlines",
    "TuitionFees",
    "LinkedIn",
    "NumberOfCampuses",
    "TotalFacultyAvailable",
    "TotalProgramsAvailable",
    "TotalStudentsEnrolled",
    "CollegeSetting",
    "TypeofInstitution",
    "CountriesRepresented",
    "GradAvgTuition",
    "GradInternationalStudents",
    "GradScholarshipHigh",
    "GradScholarshipLow",
    "GradTotalStudents",
    "Student_Faculty",
    "TotalGraduatePrograms",
    "TotalInternationalStudents",
    "TotalStudents",
    "TotalUndergradMajors",
    "UGAvgTuition",
    "UGInternationalStudents",
    "UGScholarshipHigh",
    "UGScholarshipLow",
    "UGTotalStudents",
];

pub const DEPARTMENT_FIELD_NAMES: &[&str] = &[
    "DepartmentName",
    "Description",
    "City",
    "Country",
    "CountryCode",
    "CountryName",
    "Email",
    "PhoneNumber",
    "PhoneType",
    "State",
    "Street1",
    "Street2",
    "ZipCode",
    "StateName",
    "AdmissionUrl",
    "BuildingName",
];

pub const PROGRAM_FIELD_NAMES: &[&str] = &[
    "ProgramName",
    "Level",
    "Term",
    "LiveDate",
    "DeadlineDate",
    "Resume",
    "StatementOfPurpose",
    "GreOrGmat",
    "EnglishScore",
    "Requirements",
    "WritingSample",
    "CollegeID",
    "CollegeDepartmentID",
    "IsAnalyticalNotRequired",
    "IsAnalyticalOptional",
    "IsDuoLingoRequired",
    "IsELSRequired",
    "IsGMATOrGreRequired",
    "IsGMATRequired",
    "IsGreRequired",
    "IsIELTSRequired",
    "IsLSATRequired",
    "IsMATRequired",
    "IsMCATRequired",
    "IsPTERequired",
    "IsTOEFLIBRequired",
    "IsTOEFLPBTRequired",
    "IsEnglishNotRequired",
    "IsEnglishOptional",
    "Department",
    "Fees",
    "Concentration",
    "Description",
    "ProgramWebsiteURL",
    "Accreditation",
    "AverageScholarshipAmount",
    "CostPerCredit",
    "IsRecommendationSystemOpted",
    "IsStemProgram",
    "MaxFails",
    "MaxGPA",
    "MinGPA",
    "PreviousYearAcceptanceRates",
    "QsWorldRanking",
    "IsACTRequired",
    "IsSATRequired",
    "MinimumACTScore",
    "MinimumDuoLingoScore",
    "MinimumELSScore",
    "MinimumGMATScore",
    "MinimumGreScore",
    "MinimumIELTSScore",
    "MinimumMATScore",
    "MinimumMCATScore",
    "MinimumPTEScore",
    "MinimumSATScore",
    "MinimumTOEFLScore",
    "ScholarshipAmount",
    "ScholarshipPercentage",
    "ScholarshipType",
    "MinimumLSATScore",
];

/// Social platforms stored as separate rows for a college.
pub const SOCIAL_MEDIA_PLATFORMS: &[&str] = &[
    "Facebook",
    "Instagram",
    "Twitter",
    "Youtube",
    "Tiktok",
    "LinkedIn",
];

/// Extra label synonyms used by literal extraction.
const FIELD_HINTS: &[(&str, &[&str])] = &[
    ("CollegeName", &["College Name", "Institution Name", "University Name"]),
    ("CollegeSetting", &["College Setting", "Campus Setting"]),
    ("TypeofInstitution", &["Type of Institution", "Institution Type"]),
    ("Student_Faculty", &["Student Faculty Ratio", "Student-Faculty Ratio"]),
    ("NumberOfCampuses", &["Number of Campuses", "Campuses"]),
    (
        "TotalStudentsEnrolled",
        &["Total Students Enrolled", "Enrollment", "Total Enrollment"],
    ),
    ("TotalGraduatePrograms", &["Total Graduate Programs", "Graduate Programs"]),
    ("TotalStudents", &["Total Students"]),
    ("TotalUndergradMajors", &["Total Undergrad Majors", "Undergraduate Majors"]),
    ("CountriesRepresented", &["Countries Represented"]),
    ("ApplicationFees", &["Application Fee", "Application Fees"]),
    ("TuitionFees", &["Tuition Fee", "Tuition Fees"]),
    ("GradTotalStudents", &["Graduate Students", "Graduate Student Population"]),
    (
        "UGTotalStudents",
        &["Undergraduate Students", "Undergraduate Student Population"],
    ),
    ("GradAvgTuition", &["Graduate Average Tuition", "Graduate Tuition"]),
    ("UGAvgTuition", &["Undergraduate Average Tuition", "Undergraduate Tuition"]),
    ("FinancialAidUrl", &["Financial Aid URL", "Financial Aid Link"]),
];

/// Keywords that mark a page as worth prioritising for a field in aggregate mode.
pub const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    ("CollegeName", &["university", "college", "institution"]),
    ("Phone", &["phone", "contact"]),
    ("Email", &["email", "contact"]),
    ("ApplicationFees", &["application fee"]),
    ("TuitionFees", &["tuition"]),
    ("GradAvgTuition", &["graduate tuition"]),
    ("UGAvgTuition", &["undergraduate tuition"]),
    ("TotalStudents", &["total students", "student body"]),
    ("TotalStudentsEnrolled", &["students enrolled", "enrollment"]),
    ("GradTotalStudents", &["graduate students"]),
    ("UGTotalStudents", &["undergraduate students"]),
    ("CountriesRepresented", &["countries represented"]),
    ("Student_Faculty", &["student faculty ratio", "student-faculty"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Integer,
    Decimal,
    Currency,
    Url,
    Email,
    Phone,
    Date,
    Boolean,
    Percent,
}

impl TypeHint {
    pub fn describe(&self) -> &'static str {
        match self {
            TypeHint::Integer => "integer count (digits only, no commas)",
            TypeHint::Decimal => "decimal number (use digits with a period as needed)",
            TypeHint::Currency => "numeric currency amount (digits only, no symbols)",
            TypeHint::Url => "full URL (http or https)",
            TypeHint::Email => "email address",
            TypeHint::Phone => "phone number including area code",
            TypeHint::Date => "ISO date (YYYY-MM-DD)",
            TypeHint::Boolean => "boolean flag, respond with 'true' or 'false'",
            TypeHint::Percent => "percentage or rate (digits with optional % sign)",
        }
    }

    /// Type hint for a field name. Currency wins over integer for the scholarship ranges.
    pub fn for_field(field: &str) -> Option<TypeHint> {
        match field {
            "ApplicationFees" | "TuitionFees" | "GradAvgTuition" | "GradScholarshipHigh"
            | "GradScholarshipLow" | "UGAvgTuition" | "UGScholarshipHigh" | "UGScholarshipLow"
            | "Fees" | "AverageScholarshipAmount" | "CostPerCredit" | "ScholarshipAmount" => {
                Some(TypeHint::Currency)
            }
            "NumberOfCampuses" | "TotalFacultyAvailable" | "TotalProgramsAvailable"
            | "TotalStudentsEnrolled" | "TotalGraduatePrograms" | "TotalInternationalStudents"
            | "TotalStudents" | "TotalUndergradMajors" | "GradInternationalStudents"
            | "GradTotalStudents" | "UGInternationalStudents" | "UGTotalStudents" | "CollegeID"
            | "CollegeDepartmentID" | "MaxFails" | "QsWorldRanking" => Some(TypeHint::Integer),
            f if f.starts_with("Minimum") && f.ends_with("Score") => Some(TypeHint::Integer),
            "MaxGPA" | "MinGPA" => Some(TypeHint::Decimal),
            "LiveDate" | "DeadlineDate" => Some(TypeHint::Date),
            "LogoPath" | "WebsiteUrl" | "AdmissionOfficeUrl" | "VirtualTourUrl" | "Facebook"
            | "Instagram" | "Twitter" | "Youtube" | "Tiktok" | "FinancialAidUrl" | "LinkedIn"
            | "AdmissionUrl" | "ProgramWebsiteURL" => Some(TypeHint::Url),
            "Email" | "SecondaryEmail" => Some(TypeHint::Email),
            "Phone" | "PhoneNumber" => Some(TypeHint::Phone),
            "ScholarshipPercentage" | "PreviousYearAcceptanceRates" => Some(TypeHint::Percent),
            f if f.starts_with("Is") && f.len() > 2 && f[2..].starts_with(char::is_uppercase) => {
                Some(TypeHint::Boolean)
            }
            _ => None,
        }
    }
}

/// Descriptor driving every stage for one entity kind.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Human label, also used in LLM prompts.
    pub label: &'static str,
    pub id_label: &'static str,
    pub field_names: &'static [&'static str],
    /// Field that must resolve to a non-empty value at finalize time.
    pub required_field: &'static str,
    /// Heuristic output field → this entity's field, applied when the target is still empty.
    pub heuristic_aliases: &'static [(&'static str, &'static str)],
}

static SCHEMAS: [EntitySchema; 3] = [
    EntitySchema {
        kind: EntityKind::College,
        label: "College",
        id_label: "College ID",
        field_names: COLLEGE_FIELD_NAMES,
        required_field: "CollegeName",
        heuristic_aliases: &[],
    },
    EntitySchema {
        kind: EntityKind::Department,
        label: "Admissions Office",
        id_label: "Department ID",
        field_names: DEPARTMENT_FIELD_NAMES,
        required_field: "DepartmentName",
        heuristic_aliases: &[
            ("Phone", "PhoneNumber"),
            ("AdmissionOfficeUrl", "AdmissionUrl"),
            ("WebsiteUrl", "AdmissionUrl"),
        ],
    },
    EntitySchema {
        kind: EntityKind::Program,
        label: "Program",
        id_label: "Program ID",
        field_names: PROGRAM_FIELD_NAMES,
        required_field: "ProgramName",
        heuristic_aliases: &[
            ("WebsiteUrl", "ProgramWebsiteURL"),
            ("AdmissionOfficeUrl", "ProgramWebsiteURL"),
        ],
    },
];

pub fn schema(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::College => &SCHEMAS[0],
        EntityKind::Department => &SCHEMAS[1],
        EntityKind::Program => &SCHEMAS[2],
    }
}

impl EntitySchema {
    pub fn has_field(&self, field: &str) -> bool {
        self.field_names.contains(&field)
    }

    /// Field → sorted label variants (humanized, underscore-spaced, raw, plus synonyms).
    pub fn field_labels(&self) -> &'static IndexMap<String, Vec<String>> {
        static COLLEGE: OnceLock<IndexMap<String, Vec<String>>> = OnceLock::new();
        static DEPARTMENT: OnceLock<IndexMap<String, Vec<String>>> = OnceLock::new();
        static PROGRAM: OnceLock<IndexMap<String, Vec<String>>> = OnceLock::new();

        let (cell, hints): (_, &[(&str, &[&str])]) = match self.kind {
            EntityKind::College => (&COLLEGE, FIELD_HINTS),
            EntityKind::Department => (&DEPARTMENT, &[]),
            EntityKind::Program => (&PROGRAM, &[]),
        };
        cell.get_or_init(|| build_label_map(self.field_names, hints))
    }

    /// Bullet list of `Field: description (Type: hint)` lines for the LLM prompt.
    pub fn prompt_field_lines(&self) -> String {
        self.field_names
            .iter()
            .map(|f| format!("- {}", describe_field_for_prompt(f, self.kind, self.label)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `"TotalStudents"` → `"Total Students"`, `"Student_Faculty"` → `"Student Faculty"`.
pub fn humanize_field_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, ch) in field.replace('_', " ").chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(ch);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_label_map(
    field_names: &[&str],
    hints: &[(&str, &[&str])],
) -> IndexMap<String, Vec<String>> {
    field_names
        .iter()
        .map(|field| {
            let mut variants = vec![
                humanize_field_name(field),
                field.replace('_', " "),
                field.to_string(),
            ];
            if let Some((_, extra)) = hints.iter().find(|(f, _)| f == field) {
                variants.extend(extra.iter().map(|s| s.to_string()));
            }
            let mut variants: Vec<String> = variants
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            variants.sort();
            variants.dedup();
            (field.to_string(), variants)
        })
        .collect()
}

fn description_override(field: &str, kind: EntityKind) -> Option<&'static str> {
    use EntityKind::*;
    let desc = match (kind, field) {
        (College, "CollegeName") => "Official name of the college or university.",
        (College, "LogoPath") => "URL or path pointing to the institution's official logo.",
        (College, "Phone") => "Primary phone number for the college or admissions.",
        (College, "Email") => "Primary admissions or contact email address.",
        (College, "SecondaryEmail") => "Secondary admissions or contact email address.",
        (College, "Street1") => "Primary street address line for the main campus.",
        (College, "Street2") => "Secondary street or suite information for the main campus.",
        (College, "County") => "County where the main campus is located.",
        (College, "City") => "City of the main campus.",
        (College, "State") => "State or province of the main campus.",
        (College, "Country") => "Country of the institution.",
        (College, "ZipCode") => "Postal or ZIP code of the main campus.",
        (College, "WebsiteUrl") => "Official institutional website URL.",
        (College, "AdmissionOfficeUrl") => "URL to the admissions office page.",
        (College, "VirtualTourUrl") => "URL to any virtual campus tour experience.",
        (College, "Facebook") => "Official Facebook page URL.",
        (College, "Instagram") => "Official Instagram profile URL.",
        (College, "Twitter") => "Official Twitter/X profile URL.",
        (College, "Youtube") => "Official YouTube channel URL.",
        (College, "Tiktok") => "Official TikTok account URL.",
        (College, "LinkedIn") => "Official LinkedIn page URL.",
        (College, "ApplicationFees") => "Application fee amount charged per applicant.",
        (College, "TestPolicy") => "Summary of standardized test policies.",
        (College, "CoursesAndGrades") => "Information about required courses or grade expectations.",
        (College, "Recommendations") => "Recommendation requirements for applicants.",
        (College, "PersonalEssay") => "Summary of personal essay requirements.",
        (College, "WritingSample") => "Writing sample requirements or guidance.",
        (College, "FinancialAidUrl") => "URL for financial aid information.",
        (College, "AdditionalInformation") => "Other admissions information called out on the site.",
        (College, "AdditionalDeadlines") => "Any additional application deadlines mentioned.",
        (College, "TuitionFees") => "General tuition fees or ranges for the institution.",
        (College, "NumberOfCampuses") => "Total number of campuses operated by the institution.",
        (College, "TotalFacultyAvailable") => "Total number of faculty members.",
        (College, "TotalProgramsAvailable") => "Total number of academic programs offered.",
        (College, "TotalStudentsEnrolled") => "Total number of students currently enrolled.",
        (College, "TotalGraduatePrograms") => "Total number of graduate-level programs offered.",
        (College, "TotalInternationalStudents") => "Number of international students enrolled.",
        (College, "TotalStudents") => "Total number of students across all programs.",
        (College, "TotalUndergradMajors") => "Number of undergraduate majors offered.",
        (College, "CountriesRepresented") => {
            "Number or list of countries represented within the student body."
        }
        (College, "CollegeSetting") => "Campus setting description (e.g., urban, suburban, rural).",
        (College, "TypeofInstitution") => {
            "Institution type (e.g., public university, private college)."
        }
        (College, "GradAvgTuition") => "Average annual tuition for graduate students.",
        (College, "GradInternationalStudents") => "Number of international graduate students.",
        (College, "GradScholarshipHigh") => {
            "Highest scholarship amount available to graduate students."
        }
        (College, "GradScholarshipLow") => "Lowest scholarship amount available to graduate students.",
        (College, "GradTotalStudents") => "Total number of graduate students.",
        (College, "Student_Faculty") => "Student-to-faculty ratio (e.g., 14:1).",
        (College, "UGAvgTuition") => "Average annual tuition for undergraduate students.",
        (College, "UGInternationalStudents") => "Number of international undergraduate students.",
        (College, "UGScholarshipHigh") => {
            "Highest scholarship amount available to undergraduate students."
        }
        (College, "UGScholarshipLow") => {
            "Lowest scholarship amount available to undergraduate students."
        }
        (College, "UGTotalStudents") => "Total number of undergraduate students.",

        (Department, "DepartmentName") => "Name of the academic department.",
        (Department, "Description") => "Short description or overview of the department.",
        (Department, "City") => "City location for the department office.",
        (Department, "Country") => "Country for the department office.",
        (Department, "CountryCode") => "Two-letter country code for the department office.",
        (Department, "CountryName") => "Full country name for the department office.",
        (Department, "Email") => "Primary departmental contact email.",
        (Department, "PhoneNumber") => "Primary departmental phone number.",
        (Department, "PhoneType") => "Type of phone number (e.g., office, cell).",
        (Department, "State") => "State or province for the department address.",
        (Department, "StateName") => "Full state or province name if abbreviated elsewhere.",
        (Department, "Street1") => "Primary street address for the department office.",
        (Department, "Street2") => {
            "Secondary street or suite information for the department office."
        }
        (Department, "ZipCode") => "Postal or ZIP code for the department office.",
        (Department, "AdmissionUrl") => "Department-specific admissions URL.",
        (Department, "BuildingName") => "Campus building where the department is located.",

        (Program, "ProgramName") => "Name of the academic program.",
        (Program, "Level") => "Program level (e.g., Undergraduate, Graduate, Certificate).",
        (Program, "Term") => "Academic term the details apply to (e.g., Fall 2025).",
        (Program, "LiveDate") => "Date when the program information becomes active.",
        (Program, "DeadlineDate") => "Application deadline date for the program.",
        (Program, "Resume") => "Resume/CV expectation for applicants.",
        (Program, "StatementOfPurpose") => "Statement of purpose requirements.",
        (Program, "GreOrGmat") => "GRE or GMAT score expectations.",
        (Program, "EnglishScore") => "English proficiency expectations (IELTS, TOEFL, etc.).",
        (Program, "Requirements") => "General program admission requirements.",
        (Program, "WritingSample") => "Writing sample requirements for the program.",
        (Program, "CollegeID") => "CollegeID this record should reference.",
        (Program, "CollegeDepartmentID") => "CollegeDepartmentID that the program should link to.",
        (Program, "Department") => "Name of the department offering the program.",
        (Program, "Fees") => "Tuition or fee amount for the specified term.",
        (Program, "Concentration") => "Program concentration or track, if applicable.",
        (Program, "Description") => "Detailed overview of the program curriculum or focus.",
        (Program, "ProgramWebsiteURL") => "Program-specific website URL.",
        (Program, "Accreditation") => "Accreditation status or agency for the program.",
        (Program, "CostPerCredit") => "Tuition cost per credit hour.",
        (Program, "IsRecommendationSystemOpted") => {
            "Whether recommendation letters are required (true/false)."
        }
        (Program, "IsStemProgram") => "Whether the program is STEM-designated (true/false).",
        (Program, "MaxFails") => "Maximum number of failed courses allowed for applicants.",
        (Program, "MaxGPA") => "Maximum GPA mentioned in the requirements (if applicable).",
        (Program, "MinGPA") => "Minimum GPA required for applicants.",
        (Program, "PreviousYearAcceptanceRates") => {
            "Acceptance rate from the previous admission cycle."
        }
        (Program, "QsWorldRanking") => "Program or institution QS World Ranking.",
        (Program, "IsGMATOrGreRequired") => "True if either GMAT or GRE is required.",
        (Program, "IsTOEFLIBRequired") => "True if TOEFL iBT is required.",
        (Program, "IsEnglishNotRequired") => "True if English proficiency tests are not required.",
        (Program, "IsEnglishOptional") => "True if English proficiency tests are optional.",
        (Program, "ScholarshipAmount") => "Scholarship amount offered for this program.",
        (Program, "ScholarshipPercentage") => "Scholarship percentage offered.",
        (Program, "ScholarshipType") => "Type of scholarship (merit, need-based, etc.).",
        (Department | Program, "CollegeID") => "Numeric CollegeID this record should link to.",
        _ => return None,
    };
    Some(desc)
}

/// Describe test flags and minimum scores generically: `IsGreRequired` → "True if GRE is required."
fn generic_program_description(field: &str) -> Option<String> {
    if let Some(test) = field
        .strip_prefix("Minimum")
        .and_then(|r| r.strip_suffix("Score"))
    {
        return Some(format!("Minimum {} score accepted.", test.to_uppercase()));
    }
    if let Some(test) = field
        .strip_prefix("Is")
        .and_then(|r| r.strip_suffix("Required"))
    {
        return Some(format!("True if {} is required.", test.to_uppercase()));
    }
    if let Some(test) = field
        .strip_prefix("Is")
        .and_then(|r| r.strip_suffix("Optional"))
    {
        return Some(format!("True if {} scores are optional.", test.to_lowercase()));
    }
    None
}

pub fn describe_field_for_prompt(field: &str, kind: EntityKind, entity_label: &str) -> String {
    let desc = description_override(field, kind)
        .map(str::to_string)
        .or_else(|| {
            if kind == EntityKind::Program {
                generic_program_description(field)
            } else {
                None
            }
        })
        .unwrap_or_else(|| format!("{} for this {}.", humanize_field_name(field), entity_label));

    match TypeHint::for_field(field) {
        Some(hint) => format!("{}: {} (Type: {})", field, desc, hint.describe()),
        None => format!("{}: {}", field, desc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_counts() {
        assert_eq!(COLLEGE_FIELD_NAMES.len(), 53);
        assert_eq!(DEPARTMENT_FIELD_NAMES.len(), 16);
        assert_eq!(schema(EntityKind::Program).required_field, "ProgramName");
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize_field_name("TotalStudents"), "Total Students");
        assert_eq!(humanize_field_name("Student_Faculty"), "Student Faculty");
        assert_eq!(humanize_field_name("Phone"), "Phone");
    }

    #[test]
    fn test_label_map_includes_synonyms_sorted() {
        let labels = schema(EntityKind::College).field_labels();
        let name_labels = labels.get("CollegeName").unwrap();
        assert_eq!(
            name_labels,
            &vec![
                "College Name".to_string(),
                "CollegeName".to_string(),
                "Institution Name".to_string(),
                "University Name".to_string(),
            ]
        );
        assert_eq!(labels.get_index(0).map(|(k, _)| k.as_str()), Some("CollegeName"));
        assert_eq!(labels.get("Phone").unwrap(), &vec!["Phone".to_string()]);
    }

    #[test]
    fn test_type_hints() {
        assert_eq!(TypeHint::for_field("GradScholarshipHigh"), Some(TypeHint::Currency));
        assert_eq!(TypeHint::for_field("MinimumGreScore"), Some(TypeHint::Integer));
        assert_eq!(TypeHint::for_field("IsStemProgram"), Some(TypeHint::Boolean));
        assert_eq!(TypeHint::for_field("Instagram"), Some(TypeHint::Url));
        assert_eq!(TypeHint::for_field("CollegeName"), None);
    }

    #[test]
    fn test_prompt_lines() {
        let line = describe_field_for_prompt("Phone", EntityKind::College, "College");
        assert_eq!(
            line,
            "Phone: Primary phone number for the college or admissions. (Type: phone number including area code)"
        );
        let line = describe_field_for_prompt("BuildingName", EntityKind::College, "College");
        assert_eq!(line, "BuildingName: Building Name for this College.");
        let line = describe_field_for_prompt("IsGreRequired", EntityKind::Program, "Program");
        assert!(line.starts_with("IsGreRequired: True if GRE is required."));
    }
}
