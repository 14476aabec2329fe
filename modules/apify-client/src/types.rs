use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Input for keyword search via the apidojo/tweet-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct PostSearchInput {
    #[serde(rename = "searchTerms")]
    pub search_terms: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

/// Author info nested inside a scraped post.
#[derive(Debug, Clone, Deserialize)]
pub struct PostAuthor {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
    pub followers: Option<i64>,
}

/// A single microblog post from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedPost {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "fullText")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    /// Native timestamp format, e.g. "Sat Nov 22 21:02:18 +0000 2025".
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub author: Option<PostAuthor>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<i64>,
    #[serde(rename = "retweetCount")]
    pub retweet_count: Option<i64>,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<i64>,
}

impl ScrapedPost {
    /// Returns whichever text field is populated, preferring `fullText`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    /// Parse the native timestamp format the scraper emits.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraped_post_parses_native_timestamp() {
        let post = ScrapedPost {
            id: Some("1".into()),
            text: None,
            full_text: Some("hello".into()),
            url: None,
            created_at: Some("Sat Nov 22 21:02:18 +0000 2025".into()),
            author: None,
            like_count: None,
            retweet_count: None,
            reply_count: None,
        };
        let ts = post.posted_at().expect("timestamp parses");
        assert_eq!(ts.to_rfc3339(), "2025-11-22T21:02:18+00:00");
    }

    #[test]
    fn content_prefers_full_text() {
        let post = ScrapedPost {
            id: None,
            text: Some("short".into()),
            full_text: Some("the full text".into()),
            url: None,
            created_at: Some("not a timestamp".into()),
            author: None,
            like_count: None,
            retweet_count: None,
            reply_count: None,
        };
        assert_eq!(post.content(), Some("the full text"));
        assert!(post.posted_at().is_none());
    }
}
