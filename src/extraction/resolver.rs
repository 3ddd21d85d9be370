//! Collects candidates from every strategy and page into per-entity
//! option lists, merged values and default selections.

use crate::extraction::heuristic::{heuristic_extract_fields, project_heuristics_to_entity};
use crate::extraction::literal::extract_literal_fields;
use crate::extraction::llm::LlmExtractor;
use crate::extraction::schema::{schema, FIELD_KEYWORDS};
use crate::scraping::content::truncate_chars;
use crate::types::{
    EntityExtraction, EntityKind, EntityResults, FieldCandidate, FieldMap, Origin, PageResult,
};
use std::collections::HashSet;
use tracing::debug;

const SNIPPET_CHARS: usize = 320;
const PAGE_LLM_TEXT_CHARS: usize = 6000;
const PAGE_LLM_LINK_CHARS: usize = 4000;
const AGGREGATE_TEXT_BUDGET: usize = 9000;
const AGGREGATE_INPUT_CAP: usize = 8000;

/// An existing store row offered as a linking candidate.
#[derive(Debug, Clone)]
pub struct LinkTarget {
    pub id: i64,
    pub name: String,
}

/// Candidate lists while a crawl result is being resolved. Tokens are
/// assigned when the options are built so indices follow insertion order.
#[derive(Default)]
struct Accumulator {
    extraction: EntityExtraction,
    candidates: indexmap::IndexMap<String, Vec<RawCandidate>>,
}

struct RawCandidate {
    value: String,
    origin: Origin,
    label: &'static str,
    page_url: Option<String>,
    snippet: String,
}

impl Accumulator {
    /// Append a candidate unless an identical (value, origin, page) one exists.
    fn add(
        &mut self,
        field: &str,
        value: &str,
        origin: Origin,
        label: &'static str,
        page_url: Option<&str>,
        snippet: &str,
    ) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let entries = self.candidates.entry(field.to_string()).or_default();
        if entries
            .iter()
            .any(|c| c.value == value && c.origin == origin && c.page_url.as_deref() == page_url)
        {
            return;
        }
        entries.push(RawCandidate {
            value: value.to_string(),
            origin,
            label,
            page_url: page_url.map(str::to_string),
            snippet: truncate_chars(snippet.trim(), SNIPPET_CHARS),
        });
    }

    /// Record a strategy's output: candidates for every value, first value per field kept.
    fn absorb(
        &mut self,
        fields: &FieldMap,
        origin: Origin,
        label: &'static str,
        page_url: Option<&str>,
        snippet: &str,
    ) {
        for (field, value) in fields {
            if value.trim().is_empty() {
                continue;
            }
            self.add(field, value, origin, label, page_url, snippet);
            let bucket = match origin {
                Origin::Literal => &mut self.extraction.literal,
                Origin::Heuristic => &mut self.extraction.heuristic,
                _ => &mut self.extraction.llm,
            };
            bucket
                .entry(field.clone())
                .or_insert_with(|| value.trim().to_string());
        }
    }

    fn finish(mut self, kind: EntityKind) -> EntityExtraction {
        let entity = schema(kind);
        self.extraction.merged = merge_field_values(
            entity.field_names,
            &self.extraction.literal,
            &self.extraction.heuristic,
            &self.extraction.llm,
        );

        for field in entity.field_names {
            let raw = self.candidates.shift_remove(*field).unwrap_or_default();
            let mut options: Vec<FieldCandidate> = raw
                .into_iter()
                .enumerate()
                .map(|(index, c)| FieldCandidate {
                    token: format!("{}::{}::{}::{}", c.origin.key(), kind.key(), field, index),
                    entity: kind,
                    field: field.to_string(),
                    label: match &c.page_url {
                        Some(url) => format!("{} • {}", c.label, url),
                        None => c.label.to_string(),
                    },
                    value: c.value,
                    origin: c.origin,
                    page_url: c.page_url,
                    snippet: c.snippet,
                })
                .collect();

            if let Some(default_value) = self.extraction.merged.get(*field) {
                let token = match options.iter().find(|o| &o.value == default_value) {
                    Some(o) => o.token.clone(),
                    None => {
                        let token = format!("merged::{}::{}::{}", kind.key(), field, options.len());
                        options.push(FieldCandidate {
                            token: token.clone(),
                            entity: kind,
                            field: field.to_string(),
                            value: default_value.clone(),
                            origin: Origin::Merged,
                            label: "Merged default".to_string(),
                            page_url: None,
                            snippet: String::new(),
                        });
                        token
                    }
                };
                self.extraction
                    .field_defaults
                    .insert(field.to_string(), token);
            }
            if !options.is_empty() {
                self.extraction
                    .field_options
                    .insert(field.to_string(), options);
            }
        }
        self.extraction
    }
}

/// First non-empty value per field, literal before heuristic before LLM.
pub fn merge_field_values(
    field_names: &[&str],
    literal: &FieldMap,
    heuristic: &FieldMap,
    llm: &FieldMap,
) -> FieldMap {
    field_names
        .iter()
        .filter_map(|field| {
            [literal, heuristic, llm]
                .iter()
                .filter_map(|source| source.get(*field))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(|v| (field.to_string(), v.to_string()))
        })
        .collect()
}

/// `text -> url` lines (or the bare URL) for one page's links.
fn page_link_blob(page: &PageResult) -> String {
    page.links
        .iter()
        .filter(|l| !l.url.is_empty())
        .map(|l| {
            if l.text.is_empty() {
                l.url.clone()
            } else {
                format!("{} -> {}", l.text, l.url)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// De-duplicated link lines across every page, in discovery order.
pub fn links_to_text(pages: &[PageResult]) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for link in pages.iter().flat_map(|p| p.links.iter()) {
        if link.url.is_empty() {
            continue;
        }
        let line = if link.text.is_empty() {
            link.url.clone()
        } else {
            format!("{} -> {}", link.text, link.url)
        };
        if seen.insert(line.clone()) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Aggregate LLM input: the first page mentioning each keyword group, then
/// the remaining pages within the text budget, then the discovered links.
pub fn build_llm_input_text(pages: &[PageResult]) -> String {
    let texts: Vec<(usize, &str)> = pages
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.text.trim()))
        .filter(|(_, t)| !t.is_empty())
        .collect();

    let mut used = HashSet::new();
    let mut sections: Vec<&str> = Vec::new();

    for (_, keywords) in FIELD_KEYWORDS {
        for (idx, text) in &texts {
            if used.contains(idx) {
                continue;
            }
            let lower = text.to_lowercase();
            if keywords.iter().any(|k| lower.contains(k)) {
                used.insert(*idx);
                sections.push(text);
                break;
            }
        }
    }

    let mut total: usize = sections.iter().map(|s| s.len() + 2).sum();
    for (idx, text) in &texts {
        if used.contains(idx) {
            continue;
        }
        if total + text.len() > AGGREGATE_TEXT_BUDGET {
            break;
        }
        total += text.len() + 2;
        sections.push(text);
    }

    let mut input = sections.join("\n\n");
    let links = links_to_text(pages);
    if !links.is_empty() {
        if !input.is_empty() {
            input.push_str("\n\n");
        }
        input.push_str("Links discovered:\n");
        input.push_str(&links);
    }
    truncate_chars(&input, AGGREGATE_INPUT_CAP)
}

async fn run_llm(
    llm: &LlmExtractor,
    input: &str,
) -> Vec<(EntityKind, FieldMap)> {
    let calls = EntityKind::ALL.iter().map(|kind| async move {
        (*kind, llm.extract(input, schema(*kind)).await)
    });
    futures::future::join_all(calls).await
}

/// Run every strategy over the crawl's pages and build the per-entity result.
///
/// Per-page mode runs heuristics and the LLM on each page with page
/// provenance; aggregate mode runs them once over a combined input. Literal
/// extraction always runs per page. `llm = None` skips the LLM strategy.
pub async fn compute_entity_extraction(
    pages: &[PageResult],
    per_page_llm: bool,
    llm: Option<&LlmExtractor>,
) -> EntityResults {
    let mut acc: [Accumulator; 3] = Default::default();
    let slot = |kind: EntityKind| kind as usize;

    for page in pages {
        let text = page.text.as_str();
        if text.trim().is_empty() && page.links.is_empty() {
            continue;
        }
        let url = Some(page.url.as_str());

        for kind in EntityKind::ALL {
            let fields = extract_literal_fields(text, kind);
            acc[slot(kind)].absorb(&fields, Origin::Literal, "Literal match", url, text);
        }

        if !per_page_llm {
            continue;
        }

        let blob = page_link_blob(page);
        let heur_input = if blob.is_empty() {
            text.to_string()
        } else {
            format!("{}\n{}", text, blob)
        };
        if !heur_input.trim().is_empty() {
            let heur = heuristic_extract_fields(&heur_input);
            for kind in EntityKind::ALL {
                let projected = project_heuristics_to_entity(&heur, kind);
                acc[slot(kind)].absorb(&projected, Origin::Heuristic, "Heuristic (page)", url, text);
            }
        }

        if let Some(llm) = llm {
            let mut llm_input = truncate_chars(text, PAGE_LLM_TEXT_CHARS);
            if !blob.is_empty() {
                llm_input = format!(
                    "{}\nLinks:\n{}",
                    llm_input,
                    truncate_chars(&blob, PAGE_LLM_LINK_CHARS)
                )
                .trim()
                .to_string();
            }
            if !llm_input.trim().is_empty() {
                for (kind, fields) in run_llm(llm, &llm_input).await {
                    acc[slot(kind)].absorb(&fields, Origin::Llm, "LLM (page)", url, text);
                }
            }
        }
    }

    if !per_page_llm {
        let combined = pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let links = links_to_text(pages);
        let heur_input = if links.is_empty() {
            combined.clone()
        } else {
            format!("{}\n{}", combined, links)
        };
        let heur = heuristic_extract_fields(&heur_input);
        for kind in EntityKind::ALL {
            let projected = project_heuristics_to_entity(&heur, kind);
            acc[slot(kind)].absorb(
                &projected,
                Origin::Heuristic,
                "Heuristic (aggregate)",
                None,
                &combined,
            );
        }

        if let Some(llm) = llm {
            let input = build_llm_input_text(pages);
            if !input.trim().is_empty() {
                debug!("Aggregate LLM input: {} chars", input.len());
                for (kind, fields) in run_llm(llm, &input).await {
                    acc[slot(kind)].absorb(&fields, Origin::Llm, "LLM (aggregate)", None, &input);
                }
            }
        }
    }

    let [college, department, program] = acc;
    EntityResults {
        college: college.finish(EntityKind::College),
        department: department.finish(EntityKind::Department),
        program: program.finish(EntityKind::Program),
    }
}

fn inject_option(
    extraction: &mut EntityExtraction,
    kind: EntityKind,
    field: &str,
    target: &LinkTarget,
    label_prefix: &str,
) {
    let token = format!("db::{}::{}::{}", kind.key(), field, target.id);
    let options = extraction.field_options.entry(field.to_string()).or_default();
    if options.iter().any(|o| o.token == token) {
        return;
    }
    options.push(FieldCandidate {
        token,
        entity: kind,
        field: field.to_string(),
        value: target.id.to_string(),
        origin: Origin::System,
        label: format!("{} • {}", label_prefix, target.name),
        page_url: None,
        snippet: String::new(),
    });
}

/// Offer existing store rows as candidates for the linking id fields so a
/// reviewer can attach to known records instead of creating duplicates.
pub fn inject_linking_options(
    results: &mut EntityResults,
    colleges: &[LinkTarget],
    college_departments: &[LinkTarget],
) {
    for college in colleges {
        inject_option(
            &mut results.department,
            EntityKind::Department,
            "CollegeID",
            college,
            "Existing college",
        );
        inject_option(
            &mut results.program,
            EntityKind::Program,
            "CollegeID",
            college,
            "Existing college",
        );
    }
    for cd in college_departments {
        inject_option(
            &mut results.program,
            EntityKind::Program,
            "CollegeDepartmentID",
            cd,
            "College department",
        );
    }
}
