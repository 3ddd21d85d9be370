use crate::core::config::LlmConfig;
use crate::core::error::{LlmError, ParseError};
use crate::extraction::schema::EntitySchema;
use crate::types::FieldMap;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Minimal chat-completion seam. Production uses [`OpenAiCompatClient`];
/// tests plug in canned responses.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, part of the response cache key.
    fn model(&self) -> &str;
}

/// Any endpoint speaking the OpenAI `chat/completions` dialect
/// (OpenAI, Ollama, LM Studio, vLLM, ...).
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ]
        });

        let builder = self.http.post(url).timeout(self.timeout).json(&body);
        // Key-less local endpoints work without an Authorization header.
        let builder = if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(self.api_key.trim())
        };
        let response = builder.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(ParseError::Json(e.to_string())))?;

        Ok(value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

const EXTRACTION_RULES: &str = "Rules:\n\
1. Only emit values that are explicitly present in the text; never guess or hallucinate.\n\
2. If a value is missing, return an empty string for that key.\n\
3. Output must be valid JSON with exactly the requested keys (no extra keys or commentary).\n\
4. Preserve wording and numbers exactly as written, except where type hints require numeric-only digits.\n\
5. Type hints: integers/decimals as digits only (strip commas, symbols), booleans as true/false, dates as YYYY-MM-DD, URLs/emails unchanged.\n\
6. Address extraction (Street1/Street2/City/State/ZipCode/Country/County/StateName/CountryName/CountryCode):\n   \
- Prefer physical campus or admissions-office addresses over mailing boxes when both are present.\n   \
- Split Street1/Street2 if lines are clearly separated; otherwise put the single line in Street1 and leave Street2 empty.\n   \
- City is a proper noun; State is the two-letter code if shown, otherwise use full name in StateName.\n   \
- ZipCode: capture 5-digit (or ZIP+4) exactly as written. CountryCode: use 2-letter code if shown.\n\
7. Phone and Email:\n   \
- Phone: capture a single canonical phone number (include country code if shown).\n   \
- Email: use the most authoritative admissions/contact email on the page; SecondaryEmail is the next best distinct email.\n\
8. URLs (WebsiteUrl, AdmissionOfficeUrl, VirtualTourUrl, FinancialAidUrl, ProgramWebsiteURL):\n   \
- Use full absolute URLs as written; do not add or remove query parameters.\n\
9. Student counts and numeric amounts (e.g., TotalStudents, UGTotalStudents, CountriesRepresented, ApplicationFees, TuitionFees):\n   \
- Emit a single numeric value when a clear number is present. If a range is given, emit the first number only.\n   \
- Strip units and symbols (e.g., '$', 'USD', 'students') and commas.\n\
10. Social links (Facebook, Instagram, Twitter, Youtube, Tiktok, LinkedIn):\n   \
- Prefer official institutional profiles. If multiple are present, choose the most official/global account.\n\
11. Never infer missing values. If unsure or multiple conflicting values appear without clear primacy, leave the field empty.\n";

/// System and user prompts for one entity extraction request.
pub fn build_prompts(entity: &EntitySchema, content: &str) -> (String, String) {
    let system_prompt = format!(
        "You are extracting structured {} data from university websites.\n{}",
        entity.label, EXTRACTION_RULES
    );
    let user_prompt = format!(
        "Fields:\n{}\n\nText:\n\"\"\"{}\"\"\"\n",
        entity.prompt_field_lines(),
        content
    );
    (system_prompt, user_prompt)
}

/// Cache key: sha256 over entity label, sorted field names and the exact content sent.
pub fn cache_key(model: &str, entity: &EntitySchema, content: &str) -> String {
    let mut fields: Vec<&str> = entity.field_names.to_vec();
    fields.sort_unstable();
    let digest = Sha256::digest(
        format!("{}|{}|{}", entity.label, fields.join(","), content).as_bytes(),
    );
    format!("{}::{:x}", model, digest)
}

/// Strip a ```json fence if the model wrapped its answer in one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model response into exactly `field_names`.
///
/// Takes the span from the first `{` to the last `}`. Every requested field
/// is present in the output; missing or null values become `""`, scalars are
/// stringified and trimmed, keys the schema does not know are dropped.
pub fn parse_llm_fields(raw: &str, field_names: &[&str]) -> Result<FieldMap, ParseError> {
    let body = strip_code_fence(raw);
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(ParseError::NoJsonObject);
    };
    if end < start {
        return Err(ParseError::NoJsonObject);
    }
    let value: serde_json::Value =
        serde_json::from_str(&body[start..=end]).map_err(|e| ParseError::Json(e.to_string()))?;
    let Some(obj) = value.as_object() else {
        return Err(ParseError::NoJsonObject);
    };

    Ok(field_names
        .iter()
        .map(|field| {
            let v = match obj.get(*field) {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Bool(b)) => b.to_string(),
                _ => String::new(),
            };
            (field.to_string(), v)
        })
        .collect())
}

/// Cached, rate-limited, retrying LLM field extraction shared by every job.
pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
    cache: Cache<String, FieldMap>,
    permits: Arc<Semaphore>,
    max_input_chars: usize,
    max_retries: u32,
    backoff_base: Duration,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>, cfg: &LlmConfig) -> Self {
        Self {
            client,
            cache: Cache::builder()
                .max_capacity(cfg.resolve_cache_size())
                .build(),
            permits: Arc::new(Semaphore::new(cfg.resolve_max_concurrent())),
            max_input_chars: cfg.resolve_max_input_chars(),
            max_retries: cfg.resolve_max_retries(),
            backoff_base: cfg.resolve_backoff_base(),
        }
    }

    /// Build from config. `None` when no API key is configured anywhere.
    pub fn from_config(http: reqwest::Client, cfg: &LlmConfig) -> Option<Self> {
        let api_key = cfg.resolve_api_key()?;
        let client = OpenAiCompatClient::new(
            http,
            cfg.resolve_base_url(),
            api_key,
            cfg.resolve_model(),
            cfg.resolve_timeout(),
        );
        info!(
            "LLM extraction enabled (model={}, base_url={})",
            client.model(),
            cfg.resolve_base_url()
        );
        Some(Self::new(Arc::new(client), cfg))
    }

    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    /// Extract every field of `entity` from `text`.
    ///
    /// Never fails: exhausted retries, permanent HTTP errors and unparseable
    /// responses are logged and yield an empty map. Only successful parses are cached.
    pub async fn extract(&self, text: &str, entity: &EntitySchema) -> FieldMap {
        if text.trim().is_empty() {
            return FieldMap::new();
        }
        let content: String = text.chars().take(self.max_input_chars).collect();
        let key = cache_key(self.client.model(), entity, &content);

        if let Some(hit) = self.cache.get(&key).await {
            debug!("LLM cache hit for {} ({} chars)", entity.label, content.len());
            return hit;
        }

        match self.request_with_retry(entity, &content).await {
            Ok(raw) => match parse_llm_fields(&raw, entity.field_names) {
                Ok(fields) => {
                    self.cache.insert(key, fields.clone()).await;
                    fields
                }
                Err(e) => {
                    warn!("LLM response for {} unusable: {}", entity.label, e);
                    FieldMap::new()
                }
            },
            Err(e) => {
                warn!("LLM extraction for {} gave up: {}", entity.label, e);
                FieldMap::new()
            }
        }
    }

    async fn request_with_retry(
        &self,
        entity: &EntitySchema,
        content: &str,
    ) -> Result<String, LlmError> {
        let (system_prompt, user_prompt) = build_prompts(entity, content);
        let attempts = AtomicU32::new(0);

        retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(self.backoff_base)
                .with_multiplier(2.0)
                .with_randomization_factor(0.1)
                .with_max_interval(Duration::from_secs(60))
                .with_max_elapsed_time(None)
                .build(),
            || async {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| backoff::Error::permanent(LlmError::Transport(e.to_string())))?;

                match self.client.complete(&system_prompt, &user_prompt).await {
                    Ok(raw) => Ok(raw),
                    Err(e) if e.is_transient() && attempt < self.max_retries => {
                        warn!("LLM attempt {} failed, retrying: {}", attempt + 1, e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            },
        )
        .await
    }
}
