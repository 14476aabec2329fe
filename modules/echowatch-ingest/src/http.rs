use std::time::Duration;

use rand::Rng;
use tracing::warn;

use echowatch_common::FetchError;

/// Attempt ceiling for one logical request.
const MAX_ATTEMPTS: u32 = 3;
/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Base backoff after a timeout or transport failure. Actual delay is
/// base * 2^attempt + jitter.
const RETRY_BASE: Duration = Duration::from_secs(2);
/// Backoff after an HTTP 429. Rate limits need more room than timeouts.
const RATE_LIMIT_BASE: Duration = Duration::from_secs(15);

/// Build the shared HTTP client with the pipeline's timeout and
/// User-Agent. Several APIs block anonymous default clients.
pub fn build_client(user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent)
        .build()
        .expect("Failed to build HTTP client")
}

/// Send a request with bounded retries. Timeouts and transport errors
/// back off and retry; a 429 retries after a longer pause; any other
/// HTTP error status returns immediately.
pub async fn send_with_retry(request: reqwest::RequestBuilder) -> Result<reqwest::Response, FetchError> {
    let mut last_err = FetchError::Transport("no attempt made".to_string());

    for attempt in 0..MAX_ATTEMPTS {
        let req = match request.try_clone() {
            Some(r) => r,
            None => {
                // Streaming bodies cannot be cloned; send once without retries.
                return check_status(request.send().await?).await;
            }
        };

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 429 {
                    last_err = FetchError::RateLimited;
                    if attempt + 1 < MAX_ATTEMPTS {
                        let backoff = RATE_LIMIT_BASE * (attempt + 1);
                        warn!(
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Rate limited, retrying after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                } else if status.is_server_error() {
                    last_err = FetchError::Http {
                        status: status.as_u16(),
                        message: resp.text().await.unwrap_or_default(),
                    };
                    if attempt + 1 < MAX_ATTEMPTS {
                        let backoff = RETRY_BASE * 2u32.pow(attempt);
                        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                        warn!(
                            attempt = attempt + 1,
                            status = status.as_u16(),
                            backoff_secs = backoff.as_secs(),
                            "Server error, retrying after backoff"
                        );
                        tokio::time::sleep(backoff + jitter).await;
                        continue;
                    }
                } else {
                    // Client errors are not transient; return at once.
                    return check_status(resp).await;
                }
            }
            Err(e) => {
                let err = FetchError::from(e);
                if err.is_transient() || matches!(err, FetchError::Transport(_)) {
                    last_err = err;
                    if attempt + 1 < MAX_ATTEMPTS {
                        let backoff = RETRY_BASE * 2u32.pow(attempt);
                        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                        warn!(
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            error = %last_err,
                            "Request failed, retrying after backoff"
                        );
                        tokio::time::sleep(backoff + jitter).await;
                        continue;
                    }
                } else {
                    return Err(err);
                }
            }
        }
    }

    Err(last_err)
}

/// GET a URL with the retry policy.
pub async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
) -> Result<reqwest::Response, FetchError> {
    send_with_retry(client.get(url)).await
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let message = resp.text().await.unwrap_or_default();
        Err(FetchError::Http {
            status: status.as_u16(),
            message: echowatch_common::text::truncate_chars(&message, 200),
        })
    }
}
