use thiserror::Error;

/// Transport or HTTP-level failure while fetching a single page.
///
/// Never escapes the crawler: the fetcher folds it into a `PageResult`
/// with status `error` so the crawl keeps going.
#[derive(Error, Debug, Clone)]
#[error("fetch failed for {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("no JSON object in response")]
    NoJsonObject,

    #[error("malformed JSON: {0}")]
    Json(String),
}

/// Failures talking to the LLM endpoint.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("rate limited by LLM endpoint")]
    RateLimited,

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM response unusable: {0}")]
    Parse(#[from] ParseError),

    #[error("no LLM credentials configured")]
    MissingCredentials,
}

impl LlmError {
    /// Rate limits, timeouts and server-side errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited | LlmError::Timeout => true,
            LlmError::Http { status, .. } => *status >= 500,
            LlmError::Transport(_) => true,
            LlmError::Parse(_) | LlmError::MissingCredentials => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.status().map(|s| s.as_u16()) == Some(429) {
            LlmError::RateLimited
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

/// User-correctable input problem at finalize time.
#[derive(Error, Debug, Clone)]
#[error("{entity}.{field}: {message}")]
pub struct ValidationError {
    pub entity: String,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Store failure, including integrity violations caught before a write.
#[derive(Error, Debug, Clone)]
#[error("{operation} on {table} failed: {message}")]
pub struct PersistenceError {
    pub table: String,
    pub operation: String,
    pub message: String,
}

impl PersistenceError {
    pub fn new(
        table: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("LLM extraction requested but no API key is configured (set llm.api_key or OPENAI_API_KEY)")]
    MissingLlmCredentials,

    #[error("invalid start URL: {0}")]
    InvalidUrl(String),
}

/// Umbrella error for job and finalize orchestration.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {0} has not finished yet")]
    JobNotFinished(String),

    #[error("job {0} ended without a result")]
    JobWithoutResult(String),

    #[error("job {0} already has an event stream attached")]
    StreamBusy(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited.is_transient());
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!LlmError::Http {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!LlmError::MissingCredentials.is_transient());
    }

    #[test]
    fn test_persistence_error_names_table() {
        let err = PersistenceError::new("ProgramDepartmentLink", "insert", "cross-college link");
        assert_eq!(
            err.to_string(),
            "insert on ProgramDepartmentLink failed: cross-college link"
        );
    }
}
