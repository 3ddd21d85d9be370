use crate::core::error::{ConfigError, PipelineError};
use crate::reconcile::finalize::{FinalizeOutcome, FinalizeRequest};
use crate::reconcile::{relink_programs_by_level, DirectoryStore, RelinkStats};
use crate::scraping::content::normalize_url;
use crate::tools::crawl::default_headers;
use crate::tools::programs::extract_program_titles;
use crate::types::*;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Status code and body for a pipeline failure. Validation and persistence
/// errors carry the entity/field or table/operation so the caller can retry narrowly.
pub fn error_response(e: PipelineError) -> ApiError {
    let (status, details) = match &e {
        PipelineError::Config(ConfigError::InvalidUrl(_)) => (StatusCode::UNPROCESSABLE_ENTITY, None),
        PipelineError::Config(_) => (StatusCode::BAD_REQUEST, None),
        PipelineError::Validation(v) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Some(json!({"entity": v.entity, "field": v.field})),
        ),
        PipelineError::Persistence(p) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(json!({"table": p.table, "operation": p.operation})),
        ),
        PipelineError::Fetch(f) => (StatusCode::BAD_GATEWAY, Some(json!({"url": f.url}))),
        PipelineError::JobNotFound(_) => (StatusCode::NOT_FOUND, None),
        PipelineError::JobNotFinished(_)
        | PipelineError::JobWithoutResult(_)
        | PipelineError::StreamBusy(_) => (StatusCode::CONFLICT, None),
        PipelineError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        debug!("Request rejected ({}): {}", status, e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            details,
        }),
    )
}

fn parse_job_id(job_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(job_id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("invalid job id '{}'", job_id))),
        )
    })
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "campus-harvest",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn start_crawl(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CrawlRequest>,
) -> Result<(StatusCode, Json<CrawlStartResponse>), ApiError> {
    let job_id = state.jobs.start(request).map_err(error_response)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CrawlStartResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

pub async fn crawl_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<crate::features::jobs::JobSnapshot>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let snapshot = state.jobs.snapshot(id).await.map_err(error_response)?;
    Ok(Json(snapshot))
}

/// Server-sent events for one job: the full backlog, then live events,
/// closing after `complete` or `error`.
pub async fn crawl_events(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let log = match state.jobs.events(id) {
        Ok(log) => log,
        Err(e) => return error_response(e).into_response(),
    };
    let Some(events) = log.subscribe() else {
        warn!("SSE subscribe refused: job {} already has a consumer", job_id);
        return error_response(PipelineError::StreamBusy(job_id)).into_response();
    };
    info!("SSE client connected for job {}", job_id);

    let stream = events.filter_map(move |event| async move {
        match serde_json::to_string(&event) {
            Ok(data) => Some(Ok::<_, Infallible>(
                Event::default().event(event.event_name()).data(data),
            )),
            Err(e) => {
                warn!("SSE serialization error for job {}: {}", event.job_id(), e);
                None
            }
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response()
}

pub async fn cancel_crawl(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let status = state.jobs.cancel(id).await.map_err(error_response)?;
    Ok(Json(json!({
        "job_id": id,
        "cancelled": !status.is_terminal(),
        "status": status,
    })))
}

/// Persist one entity from flat `choice_<field>` / `override_<field>` keys.
/// A pending decision (existing or similar college) answers 409 with the prompt.
pub async fn finalize_crawl(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(form): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<(StatusCode, Json<FinalizeOutcome>), ApiError> {
    let id = parse_job_id(&job_id)?;
    let request =
        FinalizeRequest::from_form(&form).map_err(|e| error_response(PipelineError::from(e)))?;
    let outcome = state
        .jobs
        .finalize(id, &request)
        .await
        .map_err(error_response)?;
    let status = match outcome {
        FinalizeOutcome::NeedsDecision(_) => StatusCode::CONFLICT,
        FinalizeOutcome::Saved(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

pub async fn extract_programs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProgramsExtractRequest>,
) -> Result<Json<ProgramsExtractResponse>, ApiError> {
    let url = normalize_url(&request.url).ok_or_else(|| {
        error_response(ConfigError::InvalidUrl(request.url.trim().to_string()).into())
    })?;
    let crawler = &state.config.crawler;
    let programs = extract_program_titles(
        &state.http_client,
        &url,
        &default_headers(&crawler.resolve_user_agent()),
        crawler.resolve_single_page_timeout(),
    )
    .await
    .map_err(|e| error_response(e.into()))?;
    Ok(Json(ProgramsExtractResponse { url, programs }))
}

pub async fn relink_programs(
    State(state): State<Arc<AppState>>,
    Path(college_id): Path<i64>,
) -> Result<Json<RelinkStats>, ApiError> {
    let exists = state
        .store
        .get_college(college_id)
        .await
        .map_err(|e| error_response(e.into()))?;
    if exists.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("college {} not found", college_id))),
        ));
    }
    let stats = relink_programs_by_level(state.store.as_ref(), college_id)
        .await
        .map_err(|e| error_response(e.into()))?;
    Ok(Json(stats))
}
