use thiserror::Error;

/// Failure classes for external calls. The retry helper uses the variant
/// to decide whether another attempt is worthwhile.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Timeouts and rate limits are transient; anything else is not
    /// worth retrying within the same run.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::RateLimited)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                FetchError::RateLimited
            } else {
                FetchError::Http {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
