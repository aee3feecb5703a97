use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Chat API error: {0}")]
    Chat(String),
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Transient failures worth another attempt: timeouts, refused or reset
    /// connections, throttling and 5xx responses. Client errors are final.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            AppError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            AppError::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn upstream(status: reqwest::StatusCode, body: String) -> Self {
        AppError::Upstream {
            status: status.as_u16(),
            body,
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}
