pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{PostAuthor, PostSearchInput, RunData, ScrapedPost};

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const POST_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Long-poll window per status check. The dataset fills incrementally
/// while the run is in progress, which is what makes partial-result
/// collection after a deadline possible.
const WAIT_FOR_FINISH_SECS: u32 = 30;

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Start a keyword-search scrape run. Returns immediately with run metadata.
    pub async fn start_post_search(&self, terms: &[String], max_items: u32) -> Result<RunData> {
        let input = PostSearchInput {
            search_terms: terms.to_vec(),
            max_items,
        };

        let url = format!("{}/acts/{}/runs", BASE_URL, POST_SCRAPER);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// One long-poll status check for a run.
    pub async fn run_status(&self, run_id: &str) -> Result<RunData> {
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={}",
            BASE_URL, run_id, WAIT_FOR_FINISH_SECS
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Fetch dataset items from a run. Valid for in-progress runs too;
    /// returns whatever has been written so far.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", BASE_URL, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Search posts end-to-end under a wall-clock budget: start the run,
    /// poll until it finishes or the budget expires, then fetch the
    /// dataset. On budget expiry the partial dataset is returned rather
    /// than discarded; only a terminal failure status is an error.
    pub async fn search_posts(
        &self,
        terms: &[String],
        max_items: u32,
        budget: Duration,
    ) -> Result<Vec<ScrapedPost>> {
        tracing::info!(?terms, max_items, budget_secs = budget.as_secs(), "Starting post search scrape");

        let run = self.start_post_search(terms, max_items).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let deadline = Instant::now() + budget;
        let mut latest = run;

        while !latest.is_terminal() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    run_id = %latest.id,
                    status = %latest.status,
                    "Scrape budget exhausted, collecting partial results"
                );
                break;
            }
            latest = self.run_status(&latest.id).await?;
            tracing::debug!(run_id = %latest.id, status = %latest.status, "Run status");
        }

        match latest.status.as_str() {
            "FAILED" | "ABORTED" | "TIMED-OUT" => {
                return Err(ApifyError::RunFailed(latest.status));
            }
            _ => {}
        }

        let posts: Vec<ScrapedPost> = self
            .get_dataset_items(&latest.default_dataset_id)
            .await?;
        tracing::info!(
            run_id = %latest.id,
            count = posts.len(),
            complete = latest.status == "SUCCEEDED",
            "Fetched scraped posts"
        );

        Ok(posts)
    }
}
