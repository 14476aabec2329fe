//! Sentiment classification for mention text.
//!
//! Two tiers: a lexical scorer that runs locally, and an optional remote
//! model endpoint. Classification never fails the caller; anything that
//! goes wrong degrades to neutral with a zero score.

pub mod clean;
pub mod lexical;
pub mod model;

use tracing::debug;

use echowatch_common::SentimentLabel;

pub use clean::clean_text;
pub use lexical::LexicalScorer;
pub use model::{normalize_label, ModelClient};

pub struct SentimentAnalyzer {
    model: Option<ModelClient>,
    lexical: LexicalScorer,
}

impl SentimentAnalyzer {
    /// Build an analyzer. When `model_url` is set the remote endpoint is
    /// preferred, with the lexical scorer as fallback.
    pub fn new(model_url: Option<&str>) -> Self {
        Self {
            model: model_url.map(ModelClient::new),
            lexical: LexicalScorer::new(),
        }
    }

    pub fn lexical_only() -> Self {
        Self {
            model: None,
            lexical: LexicalScorer::new(),
        }
    }

    /// Classify raw mention text. Cleans first, then scores. Empty text
    /// after cleaning is neutral.
    pub async fn classify(&self, text: &str) -> (SentimentLabel, f64) {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return (SentimentLabel::Neutral, 0.0);
        }

        if let Some(model) = &self.model {
            if let Some(result) = model.classify(&cleaned).await {
                return result;
            }
            debug!("Model classification unavailable, falling back to lexical scorer");
        }

        self.lexical.classify(&cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_is_neutral() {
        let analyzer = SentimentAnalyzer::lexical_only();
        let (label, score) = analyzer.classify("").await;
        assert_eq!(label, SentimentLabel::Neutral);
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn url_only_text_is_neutral() {
        let analyzer = SentimentAnalyzer::lexical_only();
        let (label, _) = analyzer.classify("https://example.org/post/1").await;
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn clearly_positive_text_scores_positive() {
        let analyzer = SentimentAnalyzer::lexical_only();
        let (label, score) = analyzer
            .classify("This is wonderful, amazing work, I love it!")
            .await;
        assert_eq!(label, SentimentLabel::Positive);
        assert!(score > 0.0);
    }
}
