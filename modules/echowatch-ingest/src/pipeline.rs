use anyhow::{Context, Result};
use tracing::{error, info};

use echowatch_common::text::RelevanceFilter;
use echowatch_common::{Config, ConnectorStats};
use echowatch_sentiment::SentimentAnalyzer;
use echowatch_store::{sources, Store};

use crate::aggregate;
use crate::connectors::analytics::AnalyticsConnector;
use crate::connectors::citations::CitationsConnector;
use crate::connectors::linkagg::LinkAggConnector;
use crate::connectors::microblog::MicroblogConnector;
use crate::connectors::news::NewsConnector;
use crate::connectors::{MentionSource, SourceContext};
use crate::discovery::DiscoveryLoop;
use crate::http;

/// What became of one pipeline stage.
#[derive(Debug)]
pub enum StageOutcome {
    Completed(ConnectorStats),
    Failed(String),
}

/// One run's per-stage ledger.
#[derive(Debug, Default)]
pub struct RunSummary {
    stages: Vec<(&'static str, StageOutcome)>,
}

impl RunSummary {
    fn push(&mut self, name: &'static str, outcome: StageOutcome) {
        self.stages.push((name, outcome));
    }

    pub fn failed_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|(_, o)| matches!(o, StageOutcome::Failed(_)))
            .count()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "run summary:")?;
        for (name, outcome) in &self.stages {
            match outcome {
                StageOutcome::Completed(stats) => writeln!(f, "  {name}: {stats}")?,
                StageOutcome::Failed(reason) => writeln!(f, "  {name}: FAILED ({reason})")?,
            }
        }
        Ok(())
    }
}

/// The ingestion run. Stages execute strictly in sequence; any stage
/// may fail without stopping the ones after it. Only the store
/// connection is fatal.
pub struct Pipeline {
    config: Config,
    store: Store,
}

impl Pipeline {
    pub async fn connect(config: Config) -> Result<Self> {
        let store = Store::connect(&config.database_url)
            .await
            .context("Failed to connect to the store")?;
        store.migrate().await?;
        Ok(Self { config, store })
    }

    fn analyzer(&self) -> SentimentAnalyzer {
        if self.config.sentiment_use_model {
            SentimentAnalyzer::new(self.config.sentiment_model_url.as_deref())
        } else {
            SentimentAnalyzer::lexical_only()
        }
    }

    /// Configured communities merged with every active discovered one.
    /// Discoveries from THIS run only take effect next time.
    async fn community_set(&self) -> Vec<String> {
        let mut set: Vec<String> = self
            .config
            .linkagg_communities
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
        match sources::active_names(self.store.pool()).await {
            Ok(discovered) => {
                for name in discovered {
                    if !set.contains(&name) {
                        set.push(name);
                    }
                }
            }
            Err(e) => error!(error = %e, "Failed to load discovered sources"),
        }
        set.sort();
        set
    }

    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        self.config.log_source_status();

        let client = http::build_client(&self.config.user_agent());
        let filter = RelevanceFilter::new(&self.config.entity_keywords);
        let ctx = SourceContext {
            store: self.store.clone(),
            analyzer: self.analyzer(),
        };

        // Discovery first, so a freshly found community is at most one
        // run away from being fetched.
        let discovery = DiscoveryLoop::new(
            self.config.entity_keywords.clone(),
            self.config.discovery_communities.clone(),
            &self.config.linkagg_communities,
            client.clone(),
        );
        summary.push("discovery", StageOutcome::Completed(discovery.run(&self.store).await));

        let mut mention_sources: Vec<Box<dyn MentionSource>> = Vec::new();
        if let Some(feed_url) = &self.config.news_feed_url {
            mention_sources.push(Box::new(NewsConnector::new(feed_url.clone(), client.clone())));
        }
        mention_sources.push(Box::new(MicroblogConnector::new(
            self.config.entity_name.clone(),
            self.config.microblog_handle.clone(),
            self.config.microblog_bearer_token.clone(),
            self.config.apify_api_token.clone(),
            filter.clone(),
            client.clone(),
        )));
        let communities = self.community_set().await;
        if !communities.is_empty() {
            mention_sources.push(Box::new(LinkAggConnector::new(
                communities,
                filter.clone(),
                client.clone(),
            )));
        }

        for source in &mention_sources {
            info!(source = source.name(), "Running connector");
            summary.push(source.name(), StageOutcome::Completed(source.fetch(&ctx).await));
        }

        if let (Some(api_url), Some(property_id), Some(token)) = (
            self.config.analytics_api_url.clone(),
            self.config.analytics_property_id.clone(),
            self.config.analytics_api_token.clone(),
        ) {
            let analytics = AnalyticsConnector::new(api_url, property_id, token, client.clone());
            summary.push("analytics", StageOutcome::Completed(analytics.fetch(&self.store).await));
        } else {
            info!("Analytics source not configured, skipping");
        }

        let citations = CitationsConnector::new(
            self.config.citation_ror_id.clone(),
            self.config.entity_name.clone(),
            filter,
            self.config.contact_email.clone(),
            client,
        );
        summary.push("citations", StageOutcome::Completed(citations.fetch(&self.store).await));

        match aggregate::run_rollups(&self.store).await {
            Ok(()) => summary.push("rollups", StageOutcome::Completed(ConnectorStats::default())),
            Err(e) => {
                error!(error = %e, "Rollup stage failed");
                summary.push("rollups", StageOutcome::Failed(e.to_string()));
            }
        }

        summary
    }

    /// The secondary cycle: backfill sentiment for the trailing week.
    pub async fn run_sweep(&self) -> Result<()> {
        let analyzer = self.analyzer();
        aggregate::sweep_sentiment(&self.store, &analyzer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_summary_displays_every_stage() {
        let mut summary = RunSummary::default();
        summary.push("news", StageOutcome::Completed(ConnectorStats::default()));
        summary.push("analytics", StageOutcome::Failed("boom".to_string()));

        let rendered = summary.to_string();
        assert!(rendered.contains("news: fetched=0"));
        assert!(rendered.contains("analytics: FAILED (boom)"));
        assert_eq!(summary.failed_stages(), 1);
    }
}
