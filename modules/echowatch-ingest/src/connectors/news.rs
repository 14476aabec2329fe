use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use echowatch_common::text::{strip_markup, truncate_chars, url_host};
use echowatch_common::week::week_start;
use echowatch_common::{ConnectorStats, NewMention, Platform};
use echowatch_store::mentions;

use crate::connectors::{MentionSource, SourceContext};
use crate::http;

/// Stored snippet length.
const SNIPPET_MAX_CHARS: usize = 500;

/// A feed entry normalized into the fields a mention needs.
#[derive(Debug)]
pub struct NewsAlert {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source_name: String,
    pub posted_at: DateTime<Utc>,
}

/// Normalize feed entries into alerts. Entries missing a title or a
/// link have no identity to deduplicate on and are dropped; the return
/// value carries how many.
pub fn alerts_from_feed(feed: feed_rs::model::Feed) -> (Vec<NewsAlert>, u32) {
    let mut alerts = Vec::new();
    let mut skipped = 0u32;

    for entry in feed.entries {
        let title = match entry.title.as_ref().map(|t| strip_markup(&t.content)) {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!(entry_id = %entry.id, "News entry has no title, skipping");
                skipped += 1;
                continue;
            }
        };
        let url = match entry.links.first().map(|l| l.href.clone()) {
            Some(u) => u,
            None => {
                warn!(entry_id = %entry.id, "News entry has no link, skipping");
                skipped += 1;
                continue;
            }
        };

        let snippet = entry
            .summary
            .as_ref()
            .map(|s| truncate_chars(&strip_markup(&s.content), SNIPPET_MAX_CHARS))
            .unwrap_or_default();

        let posted_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let source_name = url_host(&url).unwrap_or_else(|| "news".to_string());

        alerts.push(NewsAlert {
            title,
            url,
            snippet,
            source_name,
            posted_at,
        });
    }

    (alerts, skipped)
}

/// News-alert RSS connector. One feed, one fetch per run.
pub struct NewsConnector {
    feed_url: String,
    client: reqwest::Client,
}

impl NewsConnector {
    pub fn new(feed_url: String, client: reqwest::Client) -> Self {
        Self { feed_url, client }
    }
}

#[async_trait]
impl MentionSource for NewsConnector {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn fetch(&self, ctx: &SourceContext) -> ConnectorStats {
        let mut stats = ConnectorStats::default();

        let resp = match http::get_with_retry(&self.client, &self.feed_url).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "News feed fetch failed");
                stats.failed += 1;
                return stats;
            }
        };
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Failed to read news feed body");
                stats.failed += 1;
                return stats;
            }
        };
        let feed = match feed_rs::parser::parse(&bytes[..]) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Failed to parse news feed");
                stats.failed += 1;
                return stats;
            }
        };

        let entry_count = feed.entries.len() as u32;
        let (alerts, skipped) = alerts_from_feed(feed);
        stats.fetched = entry_count;
        stats.skipped = skipped;

        for alert in alerts {
            let body = if alert.snippet.is_empty() {
                alert.title.clone()
            } else {
                alert.snippet.clone()
            };
            let (label, score) = ctx.analyzer.classify(&body).await;

            let mention = NewMention {
                platform: Platform::News,
                natural_key: NewMention::news_key(&alert.url, &alert.title),
                author: alert.source_name,
                body_text: body,
                source_url: alert.url,
                posted_at: alert.posted_at,
                week_start_date: week_start(alert.posted_at.date_naive()),
                likes: 0,
                reshares: 0,
                replies: 0,
                sentiment_label: Some(label),
                sentiment_score: Some(score),
                sentiment_analyzed_at: Some(Utc::now()),
            };

            match mentions::insert_mention(ctx.store.pool(), &mention).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    warn!(error = %e, url = %mention.source_url, "Failed to store news mention");
                    stats.failed += 1;
                }
            }
        }

        info!(%stats, "News feed processed");
        stats
    }
}
