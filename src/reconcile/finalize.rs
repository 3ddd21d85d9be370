//! Turns a reviewer's field selections into store writes.

use super::level::{classify_level, is_compatible};
use super::matcher::{match_department, MatchStrategy};
use super::names::{similar_colleges, SimilarCollege};
use super::store::DirectoryStore;
use crate::core::error::{PersistenceError, PipelineError, ValidationError};
use crate::extraction::resolver::{inject_linking_options, LinkTarget};
use crate::extraction::schema::schema;
use crate::types::{CrawlJobResult, EntityExtraction, EntityKind, EntityResults, FieldMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

const COLLEGE_ID: &str = "CollegeID";
const COLLEGE_DEPARTMENT_ID: &str = "CollegeDepartmentID";

/// How to proceed when the college already exists or resembles an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideChoice {
    Override,
    Skip,
    Create,
}

impl OverrideChoice {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "override" => Some(OverrideChoice::Override),
            "skip" => Some(OverrideChoice::Skip),
            "create" => Some(OverrideChoice::Create),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub entity: EntityKind,
    /// Candidate token per field.
    #[serde(default)]
    pub choices: IndexMap<String, String>,
    /// Raw values typed by the reviewer; win over `choices`.
    #[serde(default)]
    pub overrides: IndexMap<String, String>,
    #[serde(default)]
    pub override_choice: Option<OverrideChoice>,
}

/// Fields a reviewer may set for `kind`: the schema's fields plus the id
/// fields that link it to existing rows.
fn selectable_fields(kind: EntityKind) -> Vec<&'static str> {
    let mut fields = schema(kind).field_names.to_vec();
    if kind == EntityKind::Department {
        fields.push(COLLEGE_ID);
    }
    fields
}

fn form_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl FinalizeRequest {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            choices: IndexMap::new(),
            overrides: IndexMap::new(),
            override_choice: None,
        }
    }

    /// Parse flat form-style keys: `entity`, `choice_<field>`,
    /// `override_<field>` (each optionally written `choice_<entity>_<field>`),
    /// and `override_choice` / `override_choice_<entity>`.
    /// Keys naming unknown fields are ignored.
    pub fn from_form(form: &serde_json::Map<String, Value>) -> Result<Self, ValidationError> {
        let entity_raw = form
            .get("entity")
            .and_then(form_value)
            .unwrap_or_else(|| "college".to_string());
        let entity = EntityKind::parse(&entity_raw).ok_or_else(|| {
            ValidationError::new("request", "entity", format!("unknown entity '{}'", entity_raw))
        })?;
        let fields = selectable_fields(entity);
        let entity_prefix = format!("{}_", entity.key());
        let field_of = |rest: &str| -> Option<String> {
            let rest = match rest.strip_prefix(&entity_prefix) {
                Some(tail) if fields.contains(&tail) => tail,
                _ => rest,
            };
            fields.contains(&rest).then(|| rest.to_string())
        };

        let mut request = FinalizeRequest::new(entity);
        let specific_choice_key = format!("override_choice_{}", entity.key());
        for (key, value) in form {
            let Some(value) = form_value(value) else {
                continue;
            };
            if key == "override_choice" || *key == specific_choice_key {
                if value.trim().is_empty() {
                    continue;
                }
                let choice = OverrideChoice::parse(&value).ok_or_else(|| {
                    ValidationError::new(
                        entity.key(),
                        "override_choice",
                        format!("expected override, skip or create, got '{}'", value.trim()),
                    )
                })?;
                if key == "override_choice" || request.override_choice.is_none() {
                    request.override_choice = Some(choice);
                }
            } else if let Some(rest) = key.strip_prefix("override_") {
                if let Some(field) = field_of(rest) {
                    request.overrides.insert(field, value);
                }
            } else if let Some(rest) = key.strip_prefix("choice_") {
                if let Some(field) = field_of(rest) {
                    request.choices.insert(field, value);
                }
            }
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    /// A college with exactly this name exists.
    Exists,
    /// No exact match, but similarly named colleges exist.
    Similar,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionPrompt {
    pub kind: DecisionKind,
    pub message: String,
    pub existing_college_id: Option<i64>,
    pub existing_values: FieldMap,
    pub proposed_values: FieldMap,
    pub similar_colleges: Vec<SimilarCollege>,
}

/// Where a program's department link came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    Explicit,
    Selected,
    Matched(MatchStrategy),
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedEntity {
    pub entity: EntityKind,
    /// `None` only when a new college was skipped.
    pub id: Option<i64>,
    pub action: ReconcileAction,
    pub message: String,
    pub warnings: Vec<String>,
    pub college_department_id: Option<i64>,
    pub link_id: Option<i64>,
    pub link_source: Option<LinkSource>,
}

impl SavedEntity {
    fn new(entity: EntityKind, id: Option<i64>, action: ReconcileAction, message: String) -> Self {
        Self {
            entity,
            id,
            action,
            message,
            warnings: Vec::new(),
            college_department_id: None,
            link_id: None,
            link_source: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    NeedsDecision(DecisionPrompt),
    Saved(SavedEntity),
}

struct Selection {
    tokens: IndexMap<String, String>,
    overrides: IndexMap<String, String>,
    values: FieldMap,
}

/// Override (trimmed, non-empty) beats the chosen token; an unknown token
/// leaves the field unset.
fn resolve_selection(extraction: &EntityExtraction, request: &FinalizeRequest) -> Selection {
    let mut selection = Selection {
        tokens: IndexMap::new(),
        overrides: IndexMap::new(),
        values: FieldMap::new(),
    };
    for field in selectable_fields(request.entity) {
        let override_value = request
            .overrides
            .get(field)
            .map(|v| v.trim())
            .unwrap_or_default();
        if !override_value.is_empty() {
            selection.overrides.insert(field.to_string(), override_value.to_string());
            selection.tokens.insert(field.to_string(), String::new());
            selection.values.insert(field.to_string(), override_value.to_string());
            continue;
        }

        let token = request
            .choices
            .get(field)
            .map(|t| t.trim())
            .unwrap_or_default();
        selection.tokens.insert(field.to_string(), token.to_string());
        if token.is_empty() {
            continue;
        }
        match extraction.find_option(field, token) {
            Some(candidate) if !candidate.value.trim().is_empty() => {
                selection
                    .values
                    .insert(field.to_string(), candidate.value.trim().to_string());
            }
            Some(_) => {}
            None => warn!("Unknown choice token {} for {}.{}", token, request.entity, field),
        }
    }
    selection
}

fn parse_id(entity: EntityKind, field: &str, values: &FieldMap) -> Result<Option<i64>, ValidationError> {
    match values.get(field) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            ValidationError::new(entity.key(), field, format!("'{}' is not a valid id", raw))
        }),
    }
}

/// Store payload: selected values without the linking id fields.
fn payload(values: &FieldMap) -> FieldMap {
    values
        .iter()
        .filter(|(k, _)| k.as_str() != COLLEGE_ID && k.as_str() != COLLEGE_DEPARTMENT_ID)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Re-offer every college and college department in the store as linking candidates.
pub async fn refresh_linking_options(
    store: &dyn DirectoryStore,
    results: &mut EntityResults,
) -> Result<(), PersistenceError> {
    let colleges: Vec<LinkTarget> = store
        .list_colleges()
        .await?
        .into_iter()
        .map(|c| LinkTarget { id: c.id, name: c.name })
        .collect();
    let departments: Vec<LinkTarget> = store
        .list_college_departments(None)
        .await?
        .into_iter()
        .map(|d| LinkTarget {
            id: d.college_department_id,
            name: d.name,
        })
        .collect();
    inject_linking_options(results, &colleges, &departments);
    Ok(())
}

/// Persist one entity from the reviewer's selections.
///
/// The submitted tokens and overrides are written back into `job` before
/// anything else, so a failed or prompted finalize keeps them for the retry.
pub async fn finalize(
    store: &dyn DirectoryStore,
    job: &mut CrawlJobResult,
    request: &FinalizeRequest,
) -> Result<FinalizeOutcome, PipelineError> {
    let entity = request.entity;
    let selection = resolve_selection(job.entity_results.get(entity), request);
    {
        let extraction = job.entity_results.get_mut(entity);
        extraction.field_defaults = selection.tokens.clone();
        extraction.selection_overrides = selection.overrides.clone();
    }

    let required = schema(entity).required_field;
    if selection
        .values
        .get(required)
        .map(|v| v.trim().is_empty())
        .unwrap_or(true)
    {
        return Err(ValidationError::new(
            entity.key(),
            required,
            format!("select or enter {} before saving", required),
        )
        .into());
    }

    let outcome = match entity {
        EntityKind::College => finalize_college(store, job, request, &selection.values).await?,
        EntityKind::Department => finalize_department(store, job, &selection.values).await?,
        EntityKind::Program => finalize_program(store, job, &selection.values).await?,
    };

    if matches!(outcome, FinalizeOutcome::Saved(_)) {
        refresh_linking_options(store, &mut job.entity_results).await?;
    }
    Ok(outcome)
}

async fn finalize_college(
    store: &dyn DirectoryStore,
    job: &mut CrawlJobResult,
    request: &FinalizeRequest,
    values: &FieldMap,
) -> Result<FinalizeOutcome, PipelineError> {
    let name = values.get("CollegeName").map(|v| v.trim()).unwrap_or_default();
    let fields = payload(values);
    let existing = store.find_college_by_name(name).await?;
    let similar = similar_colleges(name, &store.list_colleges().await?);

    let saved = match (existing, request.override_choice) {
        (Some(college), None) => {
            return Ok(FinalizeOutcome::NeedsDecision(DecisionPrompt {
                kind: DecisionKind::Exists,
                message: format!(
                    "College '{}' already exists (ID: {}). Choose override or skip.",
                    name, college.id
                ),
                existing_college_id: Some(college.id),
                existing_values: college.fields,
                proposed_values: fields,
                similar_colleges: similar,
            }));
        }
        (Some(college), Some(OverrideChoice::Override)) => {
            store.update_college(college.id, &fields).await?;
            info!("Updated college {} ({})", college.id, name);
            SavedEntity::new(
                EntityKind::College,
                Some(college.id),
                ReconcileAction::Updated,
                format!("College ID {} updated with new values.", college.id),
            )
        }
        (Some(college), Some(OverrideChoice::Skip)) => SavedEntity::new(
            EntityKind::College,
            Some(college.id),
            ReconcileAction::Skipped,
            format!("Using existing College ID {}. No changes were made.", college.id),
        ),
        (Some(college), Some(OverrideChoice::Create)) => {
            return Err(ValidationError::new(
                "college",
                "CollegeName",
                format!(
                    "college '{}' already exists (ID: {}); choose override or skip",
                    name, college.id
                ),
            )
            .into());
        }
        (None, None) if !similar.is_empty() => {
            let names: Vec<&str> = similar.iter().map(|s| s.name.as_str()).collect();
            return Ok(FinalizeOutcome::NeedsDecision(DecisionPrompt {
                kind: DecisionKind::Similar,
                message: format!(
                    "College '{}' resembles existing colleges: {}. Choose create or skip.",
                    name,
                    names.join(", ")
                ),
                existing_college_id: None,
                existing_values: FieldMap::new(),
                proposed_values: fields,
                similar_colleges: similar,
            }));
        }
        (None, Some(OverrideChoice::Skip)) => {
            return Ok(FinalizeOutcome::Saved(SavedEntity::new(
                EntityKind::College,
                None,
                ReconcileAction::Skipped,
                format!("College '{}' was not saved.", name),
            )));
        }
        (None, _) => {
            let id = store.insert_college(&fields).await?;
            info!("Created college {} ({})", id, name);
            SavedEntity::new(
                EntityKind::College,
                Some(id),
                ReconcileAction::Created,
                format!("College ID {} created.", id),
            )
        }
    };

    job.entity_results.college.ingested_id = saved.id;
    job.selected_college_id = saved.id;
    Ok(FinalizeOutcome::Saved(saved))
}

/// College the department or program belongs to: the chosen CollegeID, else
/// the college saved earlier in this job.
async fn target_college(
    store: &dyn DirectoryStore,
    job: &CrawlJobResult,
    entity: EntityKind,
    values: &FieldMap,
) -> Result<i64, PipelineError> {
    let college_id = parse_id(entity, COLLEGE_ID, values)?
        .or(job.selected_college_id)
        .ok_or_else(|| {
            ValidationError::new(
                entity.key(),
                COLLEGE_ID,
                format!("save a college first before adding a {}", entity.key()),
            )
        })?;
    if store.get_college(college_id).await?.is_none() {
        return Err(ValidationError::new(
            entity.key(),
            COLLEGE_ID,
            format!("college {} does not exist", college_id),
        )
        .into());
    }
    Ok(college_id)
}

async fn finalize_department(
    store: &dyn DirectoryStore,
    job: &mut CrawlJobResult,
    values: &FieldMap,
) -> Result<FinalizeOutcome, PipelineError> {
    let college_id = target_college(store, job, EntityKind::Department, values).await?;
    let created = store.insert_department(college_id, &payload(values)).await?;
    info!(
        "Created department {} (college department {}) for college {}",
        created.department_id, created.college_department_id, college_id
    );

    let extraction = &mut job.entity_results.department;
    extraction.ingested_id = Some(created.department_id);
    extraction
        .extra_ids
        .insert(COLLEGE_DEPARTMENT_ID.to_string(), created.college_department_id);
    job.selected_college_department_id = Some(created.college_department_id);

    let mut saved = SavedEntity::new(
        EntityKind::Department,
        Some(created.department_id),
        ReconcileAction::Created,
        format!("Department saved with Department ID {}.", created.department_id),
    );
    saved.college_department_id = Some(created.college_department_id);
    Ok(FinalizeOutcome::Saved(saved))
}

async fn finalize_program(
    store: &dyn DirectoryStore,
    job: &mut CrawlJobResult,
    values: &FieldMap,
) -> Result<FinalizeOutcome, PipelineError> {
    let college_id = target_college(store, job, EntityKind::Program, values).await?;
    let name = values.get("ProgramName").cloned().unwrap_or_default();
    let level = values.get("Level").map(String::as_str);
    let category = level.and_then(classify_level);
    let departments = store.list_college_departments(Some(college_id)).await?;
    let mut warnings = Vec::new();

    let mut link: Option<(i64, LinkSource)> = None;
    if let Some(cd_id) = parse_id(EntityKind::Program, COLLEGE_DEPARTMENT_ID, values)? {
        let Some(cd) = store.get_college_department(cd_id).await? else {
            return Err(ValidationError::new(
                "program",
                COLLEGE_DEPARTMENT_ID,
                format!("college department {} does not exist", cd_id),
            )
            .into());
        };
        if cd.college_id != college_id {
            return Err(ValidationError::new(
                "program",
                COLLEGE_DEPARTMENT_ID,
                format!(
                    "college department {} belongs to college {}, not {}",
                    cd_id, cd.college_id, college_id
                ),
            )
            .into());
        }
        if !is_compatible(category, &cd.name) {
            return Err(ValidationError::new(
                "program",
                COLLEGE_DEPARTMENT_ID,
                format!(
                    "'{}' does not admit {} programs",
                    cd.name,
                    level.unwrap_or_default()
                ),
            )
            .into());
        }
        link = Some((cd_id, LinkSource::Explicit));
    }

    if link.is_none() {
        if let Some(cd_id) = job.selected_college_department_id {
            match departments.iter().find(|d| d.college_department_id == cd_id) {
                Some(cd) if is_compatible(category, &cd.name) => {
                    link = Some((cd_id, LinkSource::Selected));
                }
                Some(cd) => warnings.push(format!(
                    "selected department '{}' does not match level '{}'; matching by level instead",
                    cd.name,
                    level.unwrap_or_default()
                )),
                None => warnings.push(format!(
                    "selected college department {} is not part of college {}",
                    cd_id, college_id
                )),
            }
        }
    }

    if link.is_none() {
        let department_name = values.get("Department").map(String::as_str);
        link = match_department(college_id, department_name, level, &departments)
            .map(|m| (m.college_department_id, LinkSource::Matched(m.strategy)));
    }

    let created = store
        .insert_program(college_id, &payload(values), link.map(|(cd_id, _)| cd_id))
        .await?;
    let extraction = &mut job.entity_results.program;
    extraction.ingested_id = Some(created.program_id);
    extraction
        .extra_ids
        .insert("ProgramTermID".to_string(), created.term_id);

    let mut saved = SavedEntity::new(
        EntityKind::Program,
        Some(created.program_id),
        ReconcileAction::Created,
        format!("Program saved with Program ID {}.", created.program_id),
    );

    match link {
        Some((cd_id, source)) => {
            info!(
                "Program {} linked to college department {} ({:?})",
                created.program_id, cd_id, source
            );
            saved.college_department_id = Some(cd_id);
            saved.link_id = created.link_id;
            saved.link_source = Some(source);
        }
        None => {
            warn!("No department matched program {} ({})", created.program_id, name);
            warnings.push(format!(
                "no department matched program '{}'; saved without a department link",
                name
            ));
        }
    }
    saved.warnings = warnings;
    Ok(FinalizeOutcome::Saved(saved))
}
