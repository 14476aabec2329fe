use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
///
/// `database_url` is the only hard requirement. Every per-source
/// credential is optional: absence disables that source for the run,
/// which is a valid steady state, not an error.
#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub database_url: String,

    // Tracked entity
    pub entity_name: String,
    pub entity_keywords: Vec<String>,

    // News alert feed
    pub news_feed_url: Option<String>,

    // Microblog search API + scraping fallback
    pub microblog_bearer_token: Option<String>,
    pub microblog_handle: String,
    pub apify_api_token: Option<String>,

    // Link-aggregator communities (merged with discovered sources at startup)
    pub linkagg_communities: Vec<String>,

    // Web analytics reporting API
    pub analytics_api_url: Option<String>,
    pub analytics_property_id: Option<String>,
    pub analytics_api_token: Option<String>,

    // Citation graph API
    pub citation_ror_id: Option<String>,

    // API etiquette
    pub contact_email: String,

    // Sentiment classifier tier
    pub sentiment_use_model: bool,
    pub sentiment_model_url: Option<String>,

    // Discovery allow-list of topically-adjacent communities
    pub discovery_communities: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let entity_name = env::var("ENTITY_NAME").unwrap_or_else(|_| "echowatch".to_string());
        let entity_keywords = env::var("ENTITY_KEYWORDS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec![entity_name.to_lowercase()]);

        Self {
            database_url: required_env("DATABASE_URL"),
            microblog_handle: env::var("MICROBLOG_HANDLE")
                .unwrap_or_else(|_| entity_name.to_lowercase()),
            entity_name,
            entity_keywords,
            news_feed_url: optional_env("NEWS_FEED_URL"),
            microblog_bearer_token: optional_env("MICROBLOG_BEARER_TOKEN"),
            apify_api_token: optional_env("APIFY_API_TOKEN"),
            linkagg_communities: env::var("LINKAGG_COMMUNITIES")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            analytics_api_url: optional_env("ANALYTICS_API_URL"),
            analytics_property_id: optional_env("ANALYTICS_PROPERTY_ID"),
            analytics_api_token: optional_env("ANALYTICS_API_TOKEN"),
            citation_ror_id: optional_env("CITATION_ROR_ID"),
            contact_email: env::var("CONTACT_EMAIL")
                .unwrap_or_else(|_| "ops@example.org".to_string()),
            sentiment_use_model: env::var("SENTIMENT_USE_MODEL")
                .map(|v| matches!(v.as_str(), "1" | "true" | "True"))
                .unwrap_or(false),
            sentiment_model_url: optional_env("SENTIMENT_MODEL_URL"),
            discovery_communities: env::var("DISCOVERY_COMMUNITIES")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        }
    }

    /// User-Agent sent to APIs that ask for a contact address.
    pub fn user_agent(&self) -> String {
        format!("echowatch/0.1 (mailto:{})", self.contact_email)
    }

    /// True when the analytics connector has everything it needs.
    pub fn analytics_configured(&self) -> bool {
        self.analytics_api_url.is_some()
            && self.analytics_property_id.is_some()
            && self.analytics_api_token.is_some()
    }

    /// Log which sources are enabled for this run.
    pub fn log_source_status(&self) {
        info!(configured = self.news_feed_url.is_some(), source = "news");
        info!(
            configured = self.microblog_bearer_token.is_some(),
            fallback = self.apify_api_token.is_some(),
            source = "microblog"
        );
        info!(
            communities = self.linkagg_communities.len(),
            source = "linkagg"
        );
        info!(configured = self.analytics_configured(), source = "analytics");
        // The citation API needs no credential; a ROR id just sharpens the query.
        info!(
            ror = self.citation_ror_id.is_some(),
            source = "citations"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list(" rust, programming ,,community "),
            vec!["rust", "programming", "community"]
        );
        assert!(split_list("").is_empty());
    }
}
