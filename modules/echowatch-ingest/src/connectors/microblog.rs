use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use apify_client::ApifyClient;
use echowatch_common::text::RelevanceFilter;
use echowatch_common::week::week_start;
use echowatch_common::{ConnectorStats, FetchError, NewMention, Platform};
use echowatch_store::{mentions, metrics};

use crate::connectors::{MentionSource, SourceContext};
use crate::http;

const SEARCH_URL: &str = "https://api.x.com/2/tweets/search/recent";
const USER_URL: &str = "https://api.x.com/2/users/by/username";

/// Results per search page and the page ceiling per run.
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: u32 = 5;

/// Wall-clock budget for a fallback scrape run. Partial dataset items
/// are collected when it expires.
const SCRAPE_BUDGET: Duration = Duration::from_secs(300);
const SCRAPE_MAX_ITEMS: u32 = 100;

// ---------------------------------------------------------------------------
// Search API wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: SearchIncludes,
    meta: Option<SearchMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchIncludes {
    #[serde(default)]
    users: Vec<IncludedUser>,
}

#[derive(Debug, Deserialize)]
struct IncludedUser {
    id: String,
    username: String,
}

impl SearchResponse {
    /// Author usernames keyed by id, from the expansion lookup.
    fn usernames_by_id(&self) -> HashMap<&str, &str> {
        self.includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u.username.as_str()))
            .collect()
    }
}

/// Resolve a post's author to a username; the raw id stands in when
/// the expansion lookup is missing an entry.
fn author_name(tweet: &Tweet, usernames: &HashMap<&str, &str>) -> String {
    match &tweet.author_id {
        Some(id) => usernames.get(id.as_str()).map_or(id.as_str(), |u| *u).to_string(),
        None => "unknown".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    public_metrics: Option<TweetMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    like_count: i32,
    #[serde(default)]
    retweet_count: i32,
    #[serde(default)]
    reply_count: i32,
}

#[derive(Debug, Deserialize)]
struct SearchMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: i32,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Microblog connector: search API first, scraping fallback second.
pub struct MicroblogConnector {
    entity_name: String,
    handle: String,
    bearer_token: Option<String>,
    apify_token: Option<String>,
    filter: RelevanceFilter,
    client: reqwest::Client,
}

impl MicroblogConnector {
    pub fn new(
        entity_name: String,
        handle: String,
        bearer_token: Option<String>,
        apify_token: Option<String>,
        filter: RelevanceFilter,
        client: reqwest::Client,
    ) -> Self {
        Self {
            entity_name,
            handle,
            bearer_token,
            apify_token,
            filter,
            client,
        }
    }

    fn search_query(&self) -> String {
        // The tracked account's own posts are not mentions.
        format!(
            "\"{}\" OR @{} -is:retweet -from:{}",
            self.entity_name, self.handle, self.handle
        )
    }

    async fn search_page(
        &self,
        bearer: &str,
        next_token: Option<&str>,
    ) -> Result<SearchResponse, FetchError> {
        let query = self.search_query();
        let max_results = PAGE_SIZE.to_string();
        let mut req = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(bearer)
            .query(&[
                ("query", query.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,author_id"),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ]);
        if let Some(token) = next_token {
            req = req.query(&[("next_token", token)]);
        }

        let resp = http::send_with_retry(req).await?;
        resp.json::<SearchResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// Primary tier: paginate the recent-search endpoint.
    async fn fetch_via_api(
        &self,
        bearer: &str,
        ctx: &SourceContext,
        stats: &mut ConnectorStats,
    ) -> Result<(), FetchError> {
        let mut next_token: Option<String> = None;

        for _page in 0..MAX_PAGES {
            let page = self.search_page(bearer, next_token.as_deref()).await?;
            let usernames = page.usernames_by_id();

            for tweet in &page.data {
                stats.fetched += 1;
                let author = author_name(tweet, &usernames);
                self.store_tweet(tweet, author, ctx, stats).await;
            }

            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(())
    }

    async fn store_tweet(
        &self,
        tweet: &Tweet,
        author: String,
        ctx: &SourceContext,
        stats: &mut ConnectorStats,
    ) {
        let posted_at = tweet.created_at.unwrap_or_else(Utc::now);
        let counts = tweet.public_metrics.as_ref();

        let (label, score) = ctx.analyzer.classify(&tweet.text).await;

        let mention = NewMention {
            platform: Platform::Microblog,
            natural_key: tweet.id.clone(),
            author,
            body_text: tweet.text.clone(),
            source_url: format!("https://x.com/i/status/{}", tweet.id),
            posted_at,
            week_start_date: week_start(posted_at.date_naive()),
            likes: counts.map(|m| m.like_count).unwrap_or(0),
            reshares: counts.map(|m| m.retweet_count).unwrap_or(0),
            replies: counts.map(|m| m.reply_count).unwrap_or(0),
            sentiment_label: Some(label),
            sentiment_score: Some(score),
            sentiment_analyzed_at: Some(Utc::now()),
        };

        match mentions::insert_mention(ctx.store.pool(), &mention).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                warn!(error = %e, post_id = %mention.natural_key, "Failed to store microblog mention");
                stats.failed += 1;
            }
        }
    }

    /// Fallback tier: scrape via Apify. The scraper fuzzy-matches, so
    /// every record must pass the strict relevance filter before storage.
    async fn fetch_via_scraper(
        &self,
        token: &str,
        ctx: &SourceContext,
        stats: &mut ConnectorStats,
    ) {
        let apify = ApifyClient::new(token.to_string());
        let terms = vec![self.entity_name.clone(), format!("@{}", self.handle)];

        let posts = match apify.search_posts(&terms, SCRAPE_MAX_ITEMS, SCRAPE_BUDGET).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Scraping fallback failed");
                stats.failed += 1;
                return;
            }
        };

        for post in posts {
            stats.fetched += 1;

            let (Some(id), Some(text)) = (post.id.clone(), post.content().map(str::to_string))
            else {
                stats.skipped += 1;
                continue;
            };

            if !self.filter.matches(&text) {
                stats.skipped += 1;
                continue;
            }

            let author = post
                .author
                .as_ref()
                .and_then(|a| a.user_name.clone())
                .unwrap_or_else(|| "unknown".to_string());
            let posted_at = post.posted_at().unwrap_or_else(Utc::now);
            let source_url = post
                .url
                .clone()
                .unwrap_or_else(|| format!("https://x.com/i/status/{id}"));

            let (label, score) = ctx.analyzer.classify(&text).await;

            let mention = NewMention {
                platform: Platform::Microblog,
                natural_key: id,
                author,
                body_text: text,
                source_url,
                posted_at,
                week_start_date: week_start(posted_at.date_naive()),
                likes: post.like_count.unwrap_or(0) as i32,
                reshares: post.retweet_count.unwrap_or(0) as i32,
                replies: post.reply_count.unwrap_or(0) as i32,
                sentiment_label: Some(label),
                sentiment_score: Some(score),
                sentiment_analyzed_at: Some(Utc::now()),
            };

            match mentions::insert_mention(ctx.store.pool(), &mention).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    warn!(error = %e, post_id = %mention.natural_key, "Failed to store scraped mention");
                    stats.failed += 1;
                }
            }
        }
    }

    /// Record the tracked account's follower count, unless a run earlier
    /// today already did. The users endpoint has a tight quota.
    async fn record_followers(&self, bearer: &str, ctx: &SourceContext) {
        let today = Utc::now().date_naive();
        match metrics::daily_follower_count(ctx.store.pool(), today, Platform::Microblog).await {
            Ok(Some(count)) => {
                info!(count, "Follower count already recorded today, skipping lookup");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to check recorded follower count");
                return;
            }
        }

        let req = self
            .client
            .get(format!("{}/{}", USER_URL, self.handle))
            .bearer_auth(bearer)
            .query(&[("user.fields", "public_metrics")]);

        let followers = match http::send_with_retry(req).await {
            Ok(resp) => match resp.json::<UserResponse>().await {
                Ok(user) => user.data.public_metrics.map(|m| m.followers_count),
                Err(e) => {
                    warn!(error = %e, "Failed to parse user response");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Follower count lookup failed");
                None
            }
        };

        if let Some(count) = followers {
            if let Err(e) =
                metrics::set_daily_follower_count(ctx.store.pool(), today, Platform::Microblog, count)
                    .await
            {
                warn!(error = %e, "Failed to record follower count");
            } else {
                info!(count, "Recorded follower count");
            }
        }
    }
}

#[async_trait]
impl MentionSource for MicroblogConnector {
    fn name(&self) -> &'static str {
        "microblog"
    }

    async fn fetch(&self, ctx: &SourceContext) -> ConnectorStats {
        let mut stats = ConnectorStats::default();

        match &self.bearer_token {
            Some(bearer) => {
                if let Err(e) = self.fetch_via_api(bearer, ctx, &mut stats).await {
                    warn!(error = %e, "Search API failed, trying scraping fallback");
                    match &self.apify_token {
                        Some(token) => self.fetch_via_scraper(token, ctx, &mut stats).await,
                        None => stats.failed += 1,
                    }
                }
                self.record_followers(bearer, ctx).await;
            }
            None => match &self.apify_token {
                Some(token) => self.fetch_via_scraper(token, ctx, &mut stats).await,
                None => {
                    info!("Microblog source not configured, skipping");
                }
            },
        }

        info!(%stats, "Microblog processed");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> MicroblogConnector {
        MicroblogConnector::new(
            "Acme Collective".to_string(),
            "acmecollective".to_string(),
            None,
            None,
            RelevanceFilter::new(&["acme".to_string()]),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn search_query_excludes_own_posts_and_reshares() {
        let q = connector().search_query();
        assert!(q.contains("\"Acme Collective\""));
        assert!(q.contains("@acmecollective"));
        assert!(q.contains("-is:retweet"));
        assert!(q.contains("-from:acmecollective"));
    }

    #[test]
    fn search_response_parses_with_and_without_results() {
        let full = r#"{
            "data": [{
                "id": "1850000000000000001",
                "text": "Big news from acme today",
                "author_id": "12345",
                "created_at": "2026-08-24T10:30:00.000Z",
                "public_metrics": {"like_count": 7, "retweet_count": 2, "reply_count": 1}
            }],
            "meta": {"result_count": 1, "next_token": "abc"}
        }"#;
        let parsed: SearchResponse = serde_json::from_str(full).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].public_metrics.as_ref().unwrap().like_count, 7);
        assert_eq!(parsed.meta.unwrap().next_token.as_deref(), Some("abc"));

        // Zero-result pages omit `data` entirely.
        let empty = r#"{"meta": {"result_count": 0}}"#;
        let parsed: SearchResponse = serde_json::from_str(empty).unwrap();
        assert!(parsed.data.is_empty());
        assert!(parsed.meta.unwrap().next_token.is_none());
    }

    #[test]
    fn authors_resolve_to_usernames_via_the_expansion_lookup() {
        let raw = r#"{
            "data": [
                {"id": "1", "text": "acme ships", "author_id": "12345"},
                {"id": "2", "text": "acme again", "author_id": "99999"},
                {"id": "3", "text": "no author"}
            ],
            "includes": {"users": [{"id": "12345", "username": "some_fan"}]},
            "meta": {"result_count": 3}
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let usernames = parsed.usernames_by_id();

        assert_eq!(author_name(&parsed.data[0], &usernames), "some_fan");
        // Ids missing from the lookup fall back to the raw id.
        assert_eq!(author_name(&parsed.data[1], &usernames), "99999");
        assert_eq!(author_name(&parsed.data[2], &usernames), "unknown");
    }

    #[test]
    fn user_response_parses_follower_count() {
        let raw = r#"{"data": {"id": "12345", "username": "acmecollective",
                     "public_metrics": {"followers_count": 4321, "following_count": 10}}}"#;
        let parsed: UserResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.public_metrics.unwrap().followers_count, 4321);
    }
}
