use crate::core::config::HarvestConfig;
use crate::extraction::LlmExtractor;
use crate::features::jobs::JobManager;
use crate::reconcile::{DirectoryStore, MemoryStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    /// File-based config loaded from `campus-harvest.json` (env-var fallback for all fields).
    pub config: Arc<HarvestConfig>,
    /// Shared across every job; `None` when no LLM credentials are configured.
    pub llm: Option<Arc<LlmExtractor>>,
    pub store: Arc<dyn DirectoryStore>,
    pub jobs: Arc<JobManager>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("llm_enabled", &self.llm.is_some())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

/// One pooled client per process, shared by every crawl worker and the LLM client.
pub fn build_http_client(config: &HarvestConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(16)
        .gzip(true)
        .connect_timeout(config.crawler.resolve_page_timeout())
        .build()
}

impl AppState {
    /// State backed by the in-memory directory store; the LLM extractor is
    /// built from config when credentials exist.
    pub fn new(http_client: reqwest::Client, config: HarvestConfig) -> Self {
        let llm = LlmExtractor::from_config(http_client.clone(), &config.llm).map(Arc::new);
        Self::with_parts(http_client, config, llm, Arc::new(MemoryStore::new()))
    }

    pub fn with_parts(
        http_client: reqwest::Client,
        config: HarvestConfig,
        llm: Option<Arc<LlmExtractor>>,
        store: Arc<dyn DirectoryStore>,
    ) -> Self {
        let config = Arc::new(config);
        let jobs = Arc::new(JobManager::new(
            http_client.clone(),
            Arc::clone(&config),
            llm.clone(),
            Arc::clone(&store),
        ));
        Self {
            http_client,
            config,
            llm,
            store,
            jobs,
        }
    }
}
