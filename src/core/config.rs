use std::time::Duration;

// ---------------------------------------------------------------------------
// HarvestConfig: file-based config loader (campus-harvest.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CAMPUS_HARVEST_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Crawler sub-config (mirrors the `crawler` key in campus-harvest.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CrawlerConfig {
    /// Upper bound for concurrent page fetches. Default derives from CPU count.
    pub max_workers: Option<usize>,
    /// Per-request timeout during traversal. Default: 10.
    pub page_timeout_secs: Option<u64>,
    /// Per-request timeout for ad hoc single-page fetches. Default: 15.
    pub single_page_timeout_secs: Option<u64>,
    /// Links kept per page. Default: 80.
    pub max_links_per_page: Option<usize>,
    /// Characters of cleaned body text kept per page. Default: 1600.
    pub snippet_chars: Option<usize>,
    pub user_agent: Option<String>,
    /// Capacity of the per-job progress channel. Default: 1024.
    pub progress_buffer: Option<usize>,
}

/// Worker count when nothing is configured: twice the CPU count, clamped to [2, 32].
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 2).clamp(2, 32)
}

impl CrawlerConfig {
    /// Worker ceiling: JSON field → `CRAWLER_MAX_WORKERS` env var → CPU-derived default.
    pub fn resolve_max_workers(&self) -> usize {
        self.max_workers
            .or_else(|| env_parse("CRAWLER_MAX_WORKERS"))
            .filter(|n| *n > 0)
            .unwrap_or_else(default_worker_count)
    }

    pub fn resolve_page_timeout(&self) -> Duration {
        Duration::from_secs(
            self.page_timeout_secs
                .or_else(|| env_parse("CRAWLER_PAGE_TIMEOUT_SECS"))
                .unwrap_or(10),
        )
    }

    pub fn resolve_single_page_timeout(&self) -> Duration {
        Duration::from_secs(
            self.single_page_timeout_secs
                .or_else(|| env_parse("CRAWLER_SINGLE_PAGE_TIMEOUT_SECS"))
                .unwrap_or(15),
        )
    }

    pub fn resolve_max_links(&self) -> usize {
        self.max_links_per_page
            .or_else(|| env_parse("CRAWLER_MAX_LINKS"))
            .unwrap_or(80)
    }

    pub fn resolve_snippet_chars(&self) -> usize {
        self.snippet_chars
            .or_else(|| env_parse("CRAWLER_SNIPPET_CHARS"))
            .unwrap_or(1600)
    }

    pub fn resolve_user_agent(&self) -> String {
        if let Some(ua) = &self.user_agent {
            if !ua.trim().is_empty() {
                return ua.clone();
            }
        }
        env_string("CRAWLER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn resolve_progress_buffer(&self) -> usize {
        self.progress_buffer
            .or_else(|| env_parse("CRAWLER_PROGRESS_BUFFER"))
            .unwrap_or(1024)
            .max(1)
    }
}

/// LLM sub-config (mirrors the `llm` key in campus-harvest.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint, e.g. `https://api.openai.com/v1` or `http://localhost:11434/v1`.
    pub base_url: Option<String>,
    /// API key. Never logged. Empty string means a key-less local endpoint.
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Characters of page text sent per request. Default: 6000.
    pub max_input_chars: Option<usize>,
    /// Cached responses kept. Default: 512, never below 8.
    pub cache_size: Option<u64>,
    pub max_retries: Option<u32>,
    /// First backoff delay in seconds; doubles per attempt. Default: 1.5.
    pub backoff_base_secs: Option<f64>,
    /// Concurrent requests across all jobs. Default: 4.
    pub max_concurrent: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// API key: JSON field → `OPENAI_API_KEY` env var → `None`.
    ///
    /// An explicit `""` in the config file returns `Some("")` so key-less
    /// endpoints (Ollama / LM Studio) still count as configured.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(k) = &self.api_key {
            return Some(k.trim().to_string());
        }
        env_string("OPENAI_API_KEY")
    }

    /// Base URL: JSON field → `OPENAI_BASE_URL` env var → `https://api.openai.com/v1`.
    pub fn resolve_base_url(&self) -> String {
        if let Some(u) = &self.base_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        env_string("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Model name: JSON field → `LLM_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_model(&self) -> String {
        if let Some(m) = &self.model {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        env_string("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn resolve_max_input_chars(&self) -> usize {
        self.max_input_chars
            .or_else(|| env_parse("MAX_LLM_INPUT_CHARS"))
            .unwrap_or(6000)
    }

    pub fn resolve_cache_size(&self) -> u64 {
        self.cache_size
            .or_else(|| env_parse("LLM_CACHE_SIZE"))
            .unwrap_or(512)
            .max(8)
    }

    pub fn resolve_max_retries(&self) -> u32 {
        self.max_retries
            .or_else(|| env_parse("LLM_MAX_RETRIES"))
            .unwrap_or(6)
    }

    pub fn resolve_backoff_base(&self) -> Duration {
        let secs = self
            .backoff_base_secs
            .or_else(|| env_parse("LLM_BACKOFF_BASE"))
            .filter(|s: &f64| s.is_finite() && *s >= 0.0)
            .unwrap_or(1.5);
        Duration::from_secs_f64(secs)
    }

    pub fn resolve_max_concurrent(&self) -> usize {
        self.max_concurrent
            .or_else(|| env_parse("LLM_MAX_CONCURRENT"))
            .unwrap_or(4)
            .max(1)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .or_else(|| env_parse("LLM_TIMEOUT_SECS"))
                .unwrap_or(60),
        )
    }
}

/// Job registry sub-config.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct JobsConfig {
    /// How long a finished job stays queryable. Default: 3600.
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

impl JobsConfig {
    pub fn resolve_retention(&self) -> Duration {
        Duration::from_secs(
            self.retention_secs
                .or_else(|| env_parse("JOB_RETENTION_SECS"))
                .unwrap_or(3600),
        )
    }

    pub fn resolve_sweep_interval(&self) -> Duration {
        Duration::from_secs(
            self.sweep_interval_secs
                .or_else(|| env_parse("JOB_SWEEP_INTERVAL_SECS"))
                .unwrap_or(60)
                .max(1),
        )
    }
}

/// HTTP listener sub-config.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServerConfig {
    /// Port: `--port` flag → JSON field → `CAMPUS_HARVEST_PORT` / `PORT` → 5000.
    pub fn resolve_port(&self, cli_port: Option<u16>) -> u16 {
        cli_port
            .or(self.port)
            .or_else(|| env_parse("CAMPUS_HARVEST_PORT"))
            .or_else(|| env_parse("PORT"))
            .unwrap_or(5000)
    }

    pub fn resolve_bind_addr(&self, cli_port: Option<u16>) -> String {
        let host = self
            .host
            .clone()
            .or_else(|| env_string("CAMPUS_HARVEST_HOST"))
            .unwrap_or_else(|| "0.0.0.0".to_string());
        format!("{}:{}", host, self.resolve_port(cli_port))
    }
}

/// Top-level config loaded from `campus-harvest.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct HarvestConfig {
    pub crawler: CrawlerConfig,
    pub llm: LlmConfig,
    pub jobs: JobsConfig,
    pub server: ServerConfig,
}

/// Load `campus-harvest.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CAMPUS_HARVEST_CONFIG` env var path
/// 2. `./campus-harvest.json`
/// 3. `../campus-harvest.json`
///
/// Missing file → `HarvestConfig::default()` (all env-var fallbacks apply).
/// Parse error → log a warning, return `HarvestConfig::default()`.
pub fn load_harvest_config() -> HarvestConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("campus-harvest.json"),
        std::path::PathBuf::from("../campus-harvest.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<HarvestConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("campus-harvest.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "campus-harvest.json parse error at {}: {}; using defaults",
                    path.display(),
                    e
                );
                HarvestConfig::default()
            }
        };
    }

    HarvestConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_count_is_clamped() {
        let n = default_worker_count();
        assert!((2..=32).contains(&n));
    }

    #[test]
    fn test_json_values_take_precedence() {
        let cfg: HarvestConfig = serde_json::from_str(
            r#"{"crawler": {"max_workers": 3, "snippet_chars": 500},
                "llm": {"api_key": "", "model": "local-model", "cache_size": 2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.crawler.resolve_max_workers(), 3);
        assert_eq!(cfg.crawler.resolve_snippet_chars(), 500);
        assert_eq!(cfg.llm.resolve_api_key().as_deref(), Some(""));
        assert_eq!(cfg.llm.resolve_model(), "local-model");
        assert_eq!(cfg.llm.resolve_cache_size(), 8);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let cfg: HarvestConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.crawler.resolve_max_links(), 80);
        assert_eq!(cfg.crawler.resolve_single_page_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.jobs.resolve_retention(), Duration::from_secs(3600));
    }

    #[test]
    fn test_server_port_precedence() {
        let cfg: HarvestConfig =
            serde_json::from_str(r#"{"server": {"host": "127.0.0.1", "port": 8088}}"#).unwrap();
        assert_eq!(cfg.server.resolve_port(None), 8088);
        assert_eq!(cfg.server.resolve_port(Some(9000)), 9000);
        assert_eq!(cfg.server.resolve_bind_addr(None), "127.0.0.1:8088");
    }
}
