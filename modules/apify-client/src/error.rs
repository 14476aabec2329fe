use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Network error talking to Apify: {0}")]
    Network(String),

    #[error("Apify API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse Apify response: {0}")]
    Parse(String),

    /// The actor run reached a terminal failure state (FAILED, ABORTED
    /// or TIMED-OUT). Distinct from a budget expiry, which still yields
    /// the partial dataset.
    #[error("Scrape run ended with status: {0}")]
    RunFailed(String),
}

impl From<reqwest::Error> for ApifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApifyError::Parse(err.to_string())
        } else {
            ApifyError::Network(err.to_string())
        }
    }
}
