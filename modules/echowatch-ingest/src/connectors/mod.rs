pub mod analytics;
pub mod citations;
pub mod linkagg;
pub mod microblog;
pub mod news;

use async_trait::async_trait;

use echowatch_common::ConnectorStats;
use echowatch_sentiment::SentimentAnalyzer;
use echowatch_store::Store;

/// Shared handles passed to every connector for one run.
pub struct SourceContext {
    pub store: Store,
    pub analyzer: SentimentAnalyzer,
}

/// A mention-producing source. `fetch` never returns an error; whatever
/// went wrong shows up in the stats and the logs, and the pipeline moves
/// on to the next stage.
#[async_trait]
pub trait MentionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, ctx: &SourceContext) -> ConnectorStats;
}
