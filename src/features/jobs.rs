//! Background crawl jobs.
//!
//! `JobManager` keeps a registry of handles. Each job runs crawl, then
//! extraction, in its own spawned task. That task is the only writer of the
//! job's status and result. Progress reaches the job's event log through a
//! bounded channel; a full channel drops progress events rather than
//! stalling the crawl.

use super::job_events::{CrawlEvent, EventLog, ProcessingState};
use crate::core::config::HarvestConfig;
use crate::core::error::{ConfigError, PipelineError};
use crate::extraction::{compute_entity_extraction, LlmExtractor};
use crate::reconcile::finalize::{finalize, refresh_linking_options, FinalizeOutcome, FinalizeRequest};
use crate::reconcile::DirectoryStore;
use crate::scraping::content::normalize_url;
use crate::tools::crawl::{clamp_max_pages, crawl_site, CrawlConfig, CrawlOutcome};
use crate::types::{CrawlJobResult, CrawlRequest};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Parameters a job was started with, after defaults and clamping.
#[derive(Debug, Clone, Serialize)]
pub struct JobParams {
    pub url: String,
    pub max_pages: usize,
    pub same_domain: bool,
    pub per_page_llm: bool,
    pub llm_enabled: bool,
}

#[derive(Debug, Default)]
struct JobSlot {
    status: Option<JobStatus>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    result: Option<CrawlJobResult>,
}

#[derive(Debug)]
pub struct JobHandle {
    pub id: Uuid,
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    pub events: Arc<EventLog>,
    pub cancel: CancellationToken,
    visited: AtomicUsize,
    slot: RwLock<JobSlot>,
}

impl JobHandle {
    fn new(id: Uuid, params: JobParams) -> Self {
        Self {
            id,
            params,
            created_at: Utc::now(),
            events: EventLog::new(),
            cancel: CancellationToken::new(),
            visited: AtomicUsize::new(0),
            slot: RwLock::new(JobSlot {
                status: Some(JobStatus::Running),
                ..Default::default()
            }),
        }
    }

    pub async fn status(&self) -> JobStatus {
        self.slot.read().await.status.unwrap_or(JobStatus::Running)
    }

    async fn set_terminal(&self, status: JobStatus, error: Option<String>, result: Option<CrawlJobResult>) {
        let mut slot = self.slot.write().await;
        slot.status = Some(status);
        slot.finished_at = Some(Utc::now());
        slot.error = error;
        if result.is_some() {
            slot.result = result;
        }
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        let slot = self.slot.read().await;
        JobSnapshot {
            job_id: self.id,
            status: slot.status.unwrap_or(JobStatus::Running),
            params: self.params.clone(),
            created_at: self.created_at,
            finished_at: slot.finished_at,
            visited: self.visited.load(Ordering::Relaxed),
            error: slot.error.clone(),
            result: slot.result.clone(),
        }
    }
}

/// What `GET /crawl/{id}` reports.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(flatten)]
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub visited: usize,
    pub error: Option<String>,
    pub result: Option<CrawlJobResult>,
}

pub struct JobManager {
    jobs: DashMap<Uuid, Arc<JobHandle>>,
    http: reqwest::Client,
    config: Arc<HarvestConfig>,
    llm: Option<Arc<LlmExtractor>>,
    store: Arc<dyn DirectoryStore>,
    retention: Duration,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.len())
            .field("llm_enabled", &self.llm.is_some())
            .field("retention", &self.retention)
            .finish()
    }
}

impl JobManager {
    pub fn new(
        http: reqwest::Client,
        config: Arc<HarvestConfig>,
        llm: Option<Arc<LlmExtractor>>,
        store: Arc<dyn DirectoryStore>,
    ) -> Self {
        let retention = config.jobs.resolve_retention();
        Self {
            jobs: DashMap::new(),
            http,
            config,
            llm,
            store,
            retention,
        }
    }

    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<JobHandle>> {
        self.jobs.get(&id).map(|h| Arc::clone(h.value()))
    }

    fn require(&self, id: Uuid) -> Result<Arc<JobHandle>, PipelineError> {
        self.get(id)
            .ok_or_else(|| PipelineError::JobNotFound(id.to_string()))
    }

    /// Validate the request and start the job. Configuration problems are
    /// returned here, before any job exists.
    pub fn start(&self, request: CrawlRequest) -> Result<Uuid, PipelineError> {
        let url = normalize_url(&request.url)
            .ok_or_else(|| ConfigError::InvalidUrl(request.url.trim().to_string()))?;
        let per_page_llm = request.per_page_llm.unwrap_or(false);
        let llm_wanted = request
            .use_llm
            .unwrap_or(per_page_llm || self.llm.is_some());
        if llm_wanted && self.llm.is_none() {
            return Err(ConfigError::MissingLlmCredentials.into());
        }

        let params = JobParams {
            url,
            max_pages: clamp_max_pages(request.max_pages),
            same_domain: request.same_domain.unwrap_or(true),
            per_page_llm,
            llm_enabled: llm_wanted,
        };
        let id = Uuid::new_v4();
        let handle = Arc::new(JobHandle::new(id, params));
        self.jobs.insert(id, Arc::clone(&handle));
        info!(
            "Job {} started for {} (max_pages: {}, per_page_llm: {}, llm: {})",
            id, handle.params.url, handle.params.max_pages, per_page_llm, llm_wanted
        );

        let runner = JobRunner {
            http: self.http.clone(),
            config: Arc::clone(&self.config),
            llm: if llm_wanted { self.llm.clone() } else { None },
            store: Arc::clone(&self.store),
        };
        tokio::spawn(runner.run(handle));
        Ok(id)
    }

    /// Request cancellation; a job that already ended is left alone.
    pub async fn cancel(&self, id: Uuid) -> Result<JobStatus, PipelineError> {
        let handle = self.require(id)?;
        let status = handle.status().await;
        if !status.is_terminal() {
            info!("Cancelling job {}", id);
            handle.cancel.cancel();
        }
        Ok(status)
    }

    /// Cancel every job still running; returns how many were signalled.
    pub async fn cancel_all(&self) -> usize {
        let handles: Vec<Arc<JobHandle>> = self.jobs.iter().map(|e| Arc::clone(e.value())).collect();
        let mut cancelled = 0;
        for handle in handles {
            if !handle.status().await.is_terminal() {
                handle.cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<JobSnapshot, PipelineError> {
        Ok(self.require(id)?.snapshot().await)
    }

    pub fn events(&self, id: Uuid) -> Result<Arc<EventLog>, PipelineError> {
        Ok(Arc::clone(&self.require(id)?.events))
    }

    /// Persist one entity of a finished job.
    pub async fn finalize(
        &self,
        id: Uuid,
        request: &FinalizeRequest,
    ) -> Result<FinalizeOutcome, PipelineError> {
        let handle = self.require(id)?;
        let mut slot = handle.slot.write().await;
        if slot.status == Some(JobStatus::Running) {
            return Err(PipelineError::JobNotFinished(id.to_string()));
        }
        let Some(result) = slot.result.as_mut() else {
            return Err(PipelineError::JobWithoutResult(id.to_string()));
        };
        finalize(self.store.as_ref(), result, request).await
    }

    /// Drop jobs that finished longer than the retention period ago.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut expired = Vec::new();
        for entry in self.jobs.iter() {
            let Ok(slot) = entry.value().slot.try_read() else {
                continue;
            };
            let Some(finished_at) = slot.finished_at else {
                continue;
            };
            let old_enough = (now - finished_at)
                .to_std()
                .map(|age| age >= self.retention)
                .unwrap_or(false);
            if old_enough {
                expired.push(*entry.key());
            }
        }
        for id in &expired {
            self.jobs.remove(id);
            info!("Evicted job {}", id);
        }
        expired.len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let evicted = manager.sweep_expired(Utc::now());
                if evicted > 0 {
                    debug!("Sweeper evicted {} jobs ({} remain)", evicted, manager.len());
                }
            }
        })
    }
}

struct JobRunner {
    http: reqwest::Client,
    config: Arc<HarvestConfig>,
    llm: Option<Arc<LlmExtractor>>,
    store: Arc<dyn DirectoryStore>,
}

enum JobEnd {
    Finished(CrawlJobResult),
    Cancelled { visited: usize },
    Failed { visited: usize, message: String },
}

impl JobRunner {
    async fn run(self, handle: Arc<JobHandle>) {
        let id = handle.id;
        let limit = handle.params.max_pages;
        let (tx, mut rx) = mpsc::channel::<CrawlEvent>(self.config.crawler.resolve_progress_buffer());

        let log = Arc::clone(&handle.events);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log.push(event);
            }
        });

        let _ = tx
            .send(CrawlEvent::Start {
                job_id: id,
                visited: 0,
                limit,
                url: handle.params.url.clone(),
            })
            .await;

        let end = match AssertUnwindSafe(self.pipeline(&handle, &tx)).catch_unwind().await {
            Ok(end) => end,
            Err(_) => {
                error!("Job {} panicked", id);
                JobEnd::Failed {
                    visited: handle.visited.load(Ordering::Relaxed),
                    message: "internal error while processing the crawl".to_string(),
                }
            }
        };

        let terminal = match end {
            JobEnd::Finished(result) => {
                let event = CrawlEvent::Complete {
                    job_id: id,
                    visited: result.visited,
                    limit,
                    errors: result.errors,
                };
                info!(
                    "Job {} complete: {} visited, {} errors",
                    id, result.visited, result.errors
                );
                handle.set_terminal(JobStatus::Finished, None, Some(result)).await;
                event
            }
            JobEnd::Cancelled { visited } => {
                info!("Job {} cancelled after {} pages", id, visited);
                handle
                    .set_terminal(JobStatus::Cancelled, Some("cancelled".to_string()), None)
                    .await;
                CrawlEvent::Error {
                    job_id: id,
                    visited,
                    limit,
                    message: "cancelled".to_string(),
                }
            }
            JobEnd::Failed { visited, message } => {
                warn!("Job {} failed: {}", id, message);
                handle
                    .set_terminal(JobStatus::Failed, Some(message.clone()), None)
                    .await;
                CrawlEvent::Error {
                    job_id: id,
                    visited,
                    limit,
                    message,
                }
            }
        };
        let _ = tx.send(terminal).await;
        drop(tx);
        let _ = pump.await;
    }

    async fn pipeline(&self, handle: &Arc<JobHandle>, tx: &mpsc::Sender<CrawlEvent>) -> JobEnd {
        let id = handle.id;
        let params = &handle.params;
        let limit = params.max_pages;
        let config = CrawlConfig::from_settings(
            &params.url,
            Some(params.max_pages),
            params.same_domain,
            &self.config.crawler,
        );

        let progress_tx = tx.clone();
        let counter = Arc::clone(handle);
        let on_progress = move |p: crate::tools::crawl::CrawlProgress| {
            counter.visited.store(p.visited, Ordering::Relaxed);
            let event = CrawlEvent::Progress {
                job_id: id,
                visited: p.visited,
                limit: p.limit,
                url: p.url,
                status: p.status,
                error: p.error,
            };
            if progress_tx.try_send(event).is_err() {
                debug!("Job {} progress channel full; event dropped", id);
            }
        };

        let outcome: CrawlOutcome = match crawl_site(&self.http, config, on_progress, &handle.cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return JobEnd::Failed {
                    visited: 0,
                    message: e.to_string(),
                }
            }
        };
        if outcome.cancelled {
            return JobEnd::Cancelled {
                visited: outcome.visited,
            };
        }

        let processing = |state| CrawlEvent::Processing {
            job_id: id,
            visited: outcome.visited,
            limit,
            stage: "extraction".to_string(),
            state,
        };
        let _ = tx.send(processing(ProcessingState::Started)).await;

        let mut entity_results =
            compute_entity_extraction(&outcome.results, params.per_page_llm, self.llm.as_deref()).await;
        if handle.cancel.is_cancelled() {
            return JobEnd::Cancelled {
                visited: outcome.visited,
            };
        }
        if let Err(e) = refresh_linking_options(self.store.as_ref(), &mut entity_results).await {
            warn!("Job {}: could not load existing records for linking: {}", id, e);
        }
        let _ = tx.send(processing(ProcessingState::Finished)).await;

        JobEnd::Finished(CrawlJobResult {
            visited: outcome.visited,
            errors: outcome.errors,
            results: outcome.results,
            per_page_llm: params.per_page_llm,
            llm_enabled: self.llm.is_some(),
            entity_results,
            selected_college_id: None,
            selected_college_department_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MemoryStore;

    fn manager(config: HarvestConfig) -> JobManager {
        JobManager::new(
            reqwest::Client::new(),
            Arc::new(config),
            None,
            Arc::new(MemoryStore::new()),
        )
    }

    fn request(url: &str) -> CrawlRequest {
        CrawlRequest {
            url: url.to_string(),
            max_pages: Some(1),
            same_domain: None,
            per_page_llm: None,
            use_llm: None,
        }
    }

    #[tokio::test]
    async fn test_start_validates_before_creating_job() {
        let jobs = manager(HarvestConfig::default());
        let err = jobs.start(request("not a url")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::InvalidUrl(_))));

        let mut wants_llm = request("https://u.edu/");
        wants_llm.per_page_llm = Some(true);
        let err = jobs.start(wants_llm).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::MissingLlmCredentials)
        ));
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let jobs = manager(HarvestConfig::default());
        let id = Uuid::new_v4();
        assert!(matches!(jobs.cancel(id).await, Err(PipelineError::JobNotFound(_))));
        assert!(matches!(
            jobs.finalize(id, &FinalizeRequest::new(crate::types::EntityKind::College)).await,
            Err(PipelineError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired_finished_jobs() {
        let mut config = HarvestConfig::default();
        config.jobs.retention_secs = Some(60);
        let jobs = manager(config);

        let params = JobParams {
            url: "https://u.edu/".into(),
            max_pages: 1,
            same_domain: true,
            per_page_llm: false,
            llm_enabled: false,
        };
        let done = Arc::new(JobHandle::new(Uuid::new_v4(), params.clone()));
        done.set_terminal(JobStatus::Finished, None, Some(CrawlJobResult::default()))
            .await;
        let running = Arc::new(JobHandle::new(Uuid::new_v4(), params));
        jobs.jobs.insert(done.id, Arc::clone(&done));
        jobs.jobs.insert(running.id, Arc::clone(&running));

        assert_eq!(jobs.sweep_expired(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(jobs.sweep_expired(later), 1);
        assert!(jobs.get(done.id).is_none());
        assert!(jobs.get(running.id).is_some());
    }

    #[tokio::test]
    async fn test_cancel_all_skips_finished_jobs() {
        let jobs = manager(HarvestConfig::default());
        let params = JobParams {
            url: "https://u.edu/".into(),
            max_pages: 1,
            same_domain: true,
            per_page_llm: false,
            llm_enabled: false,
        };
        let done = Arc::new(JobHandle::new(Uuid::new_v4(), params.clone()));
        done.set_terminal(JobStatus::Finished, None, Some(CrawlJobResult::default()))
            .await;
        let running = Arc::new(JobHandle::new(Uuid::new_v4(), params));
        jobs.jobs.insert(done.id, Arc::clone(&done));
        jobs.jobs.insert(running.id, Arc::clone(&running));

        assert_eq!(jobs.cancel_all().await, 1);
        assert!(running.cancel.is_cancelled());
        assert!(!done.cancel.is_cancelled());
    }
}
