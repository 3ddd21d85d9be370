use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered field name → value map. Order follows the entity schema.
pub type FieldMap = IndexMap<String, String>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StatusSentinel {
    Error,
    NonHtml,
}

/// HTTP status of a crawled page, or one of the fixed sentinels.
///
/// Serialises as the bare number, `"error"` or `"non-html"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum PageStatus {
    Code(u16),
    Sentinel(StatusSentinel),
}

impl PageStatus {
    pub fn error() -> Self {
        PageStatus::Sentinel(StatusSentinel::Error)
    }

    pub fn non_html() -> Self {
        PageStatus::Sentinel(StatusSentinel::NonHtml)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PageStatus::Sentinel(StatusSentinel::Error))
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Code(c) => write!(f, "{}", c),
            PageStatus::Sentinel(StatusSentinel::Error) => f.write_str("error"),
            PageStatus::Sentinel(StatusSentinel::NonHtml) => f.write_str("non-html"),
        }
    }
}

/// One crawled page. Built once by the fetcher and never modified afterwards.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PageResult {
    pub url: String,
    pub status: PageStatus,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub heading: String,
    /// Cleaned body text, bounded by the snippet budget.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl PageResult {
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::error(),
            error: error.into(),
            title: String::new(),
            heading: String::new(),
            text: String::new(),
            fields: FieldMap::new(),
            links: Vec::new(),
        }
    }

    pub fn non_html(url: impl Into<String>) -> Self {
        Self {
            status: PageStatus::non_html(),
            error: String::new(),
            ..Self::failed(url, "")
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    College,
    Department,
    Program,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::College, EntityKind::Department, EntityKind::Program];

    pub fn key(&self) -> &'static str {
        match self {
            EntityKind::College => "college",
            EntityKind::Department => "department",
            EntityKind::Program => "program",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "college" => Some(EntityKind::College),
            "department" => Some(EntityKind::Department),
            "program" => Some(EntityKind::Program),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which strategy produced a candidate value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Literal,
    Heuristic,
    Llm,
    System,
    Merged,
}

impl Origin {
    pub fn key(&self) -> &'static str {
        match self {
            Origin::Literal => "literal",
            Origin::Heuristic => "heuristic",
            Origin::Llm => "llm",
            Origin::System => "system",
            Origin::Merged => "merged",
        }
    }
}

/// One proposed value for an entity field, with provenance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FieldCandidate {
    /// `"{origin}::{entity}::{field}::{index}"`, or `db::...` for existing records.
    pub token: String,
    pub entity: EntityKind,
    pub field: String,
    pub value: String,
    pub origin: Origin,
    /// Human-readable source, e.g. "Literal match" or "Existing college • MIT".
    pub label: String,
    pub page_url: Option<String>,
    #[serde(default)]
    pub snippet: String,
}

/// Everything the resolver knows about one entity kind after a crawl.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EntityExtraction {
    pub literal: FieldMap,
    pub heuristic: FieldMap,
    pub llm: FieldMap,
    pub merged: FieldMap,
    pub field_options: IndexMap<String, Vec<FieldCandidate>>,
    /// Selected candidate token per field.
    pub field_defaults: IndexMap<String, String>,
    /// Raw values typed by the reviewer, keyed by field.
    pub selection_overrides: IndexMap<String, String>,
    pub ingested_id: Option<i64>,
    #[serde(default)]
    pub extra_ids: IndexMap<String, i64>,
}

impl EntityExtraction {
    pub fn find_option(&self, field: &str, token: &str) -> Option<&FieldCandidate> {
        self.field_options
            .get(field)
            .and_then(|opts| opts.iter().find(|o| o.token == token))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EntityResults {
    pub college: EntityExtraction,
    pub department: EntityExtraction,
    pub program: EntityExtraction,
}

impl EntityResults {
    pub fn get(&self, kind: EntityKind) -> &EntityExtraction {
        match kind {
            EntityKind::College => &self.college,
            EntityKind::Department => &self.department,
            EntityKind::Program => &self.program,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut EntityExtraction {
        match kind {
            EntityKind::College => &mut self.college,
            EntityKind::Department => &mut self.department,
            EntityKind::Program => &mut self.program,
        }
    }
}

/// Terminal payload of a crawl job. Selection state inside `entity_results`
/// and the selected ids change as the reviewer finalizes entities.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CrawlJobResult {
    pub results: Vec<PageResult>,
    pub visited: usize,
    pub errors: usize,
    pub per_page_llm: bool,
    pub llm_enabled: bool,
    pub entity_results: EntityResults,
    pub selected_college_id: Option<i64>,
    pub selected_college_department_id: Option<i64>,
}

// HTTP request/response types

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub same_domain: Option<bool>,
    #[serde(default)]
    pub per_page_llm: Option<bool>,
    /// Force LLM extraction on or off. Default: on when credentials exist.
    #[serde(default)]
    pub use_llm: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlStartResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramsExtractRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramsExtractResponse {
    pub url: String,
    pub programs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}
