use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use echowatch_common::text::{strip_markup, truncate_chars, RelevanceFilter};
use echowatch_common::week::week_start;
use echowatch_common::{ConnectorStats, NewMention, Platform};
use echowatch_store::{mentions, sources};

use crate::connectors::{MentionSource, SourceContext};
use crate::http;

/// Stored body length. The relevance check always runs on the full
/// untruncated text first.
const BODY_MAX_CHARS: usize = 2000;

/// Pause between community feeds. The host throttles aggressively.
const FEED_DELAY: Duration = Duration::from_secs(2);

/// Link-aggregator connector: one RSS feed per configured community.
pub struct LinkAggConnector {
    communities: Vec<String>,
    filter: RelevanceFilter,
    client: reqwest::Client,
}

impl LinkAggConnector {
    pub fn new(communities: Vec<String>, filter: RelevanceFilter, client: reqwest::Client) -> Self {
        Self {
            communities,
            filter,
            client,
        }
    }

    fn feed_url(community: &str) -> String {
        format!("https://www.reddit.com/r/{community}/new/.rss")
    }

    async fn fetch_community(
        &self,
        community: &str,
        ctx: &SourceContext,
        stats: &mut ConnectorStats,
    ) {
        let url = Self::feed_url(community);
        let resp = match http::get_with_retry(&self.client, &url).await {
            Ok(r) => r,
            Err(e) => {
                warn!(community, error = %e, "Community feed fetch failed");
                stats.failed += 1;
                return;
            }
        };
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(community, error = %e, "Failed to read community feed body");
                stats.failed += 1;
                return;
            }
        };
        let feed = match feed_rs::parser::parse(&bytes[..]) {
            Ok(f) => f,
            Err(e) => {
                warn!(community, error = %e, "Failed to parse community feed");
                stats.failed += 1;
                return;
            }
        };

        // No-op for communities that came from config rather than
        // discovery; the row only exists for discovered ones.
        if let Err(e) = sources::touch(ctx.store.pool(), community).await {
            warn!(community, error = %e, "Failed to stamp community check time");
        }

        for entry in feed.entries {
            stats.fetched += 1;

            if entry.id.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let title = entry
                .title
                .as_ref()
                .map(|t| strip_markup(&t.content))
                .unwrap_or_default();
            let body = entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .or(entry.summary.as_ref().map(|s| s.content.as_str()))
                .map(strip_markup)
                .unwrap_or_default();

            let full_text = if body.is_empty() {
                title.clone()
            } else {
                format!("{title}\n{body}")
            };

            // Relevance is judged on the whole post, not the stored
            // prefix; a keyword past the truncation point still counts.
            if !self.filter.matches(&full_text) {
                stats.skipped += 1;
                continue;
            }

            let source_url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_else(|| format!("https://www.reddit.com/r/{community}/"));
            let author = entry
                .authors
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| format!("r/{community}"));
            let posted_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            let stored_text = truncate_chars(&full_text, BODY_MAX_CHARS);
            let (label, score) = ctx.analyzer.classify(&stored_text).await;

            let mention = NewMention {
                platform: Platform::LinkAggregator,
                natural_key: entry.id.clone(),
                author,
                body_text: stored_text,
                source_url,
                posted_at,
                week_start_date: week_start(posted_at.date_naive()),
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
                    warn!(error = %e, post_id = %mention.natural_key, "Failed to store community mention");
                    stats.failed += 1;
                }
            }
        }
    }
}

#[async_trait]
impl MentionSource for LinkAggConnector {
    fn name(&self) -> &'static str {
        "linkagg"
    }

    async fn fetch(&self, ctx: &SourceContext) -> ConnectorStats {
        let mut stats = ConnectorStats::default();

        for (i, community) in self.communities.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(FEED_DELAY).await;
            }
            self.fetch_community(community, ctx, &mut stats).await;
        }

        info!(communities = self.communities.len(), %stats, "Link-aggregator processed");
        stats
    }
}
