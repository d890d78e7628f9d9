use thiserror::Error;

/// Failures of the fetch layer. Every variant ends up as a visible message.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (timeout, DNS, connection reset).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Non-2xx response.
    #[error("http {status} from {url}: {body}")]
    Http { url: String, status: u16, body: String },
    /// Body did not match the expected response shape.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed record #{index}: missing or invalid `{field}`")]
    MalformedRecord { index: usize, field: String },
    #[error("response from {url} contains no results")]
    EmptyResultSet { url: String },
    #[error("pagination cursor revisits {url}")]
    CursorLoop { url: String },
    #[error("invalid table: {0}")]
    InvalidTable(String),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Transport failures, 5xx and 429 may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
