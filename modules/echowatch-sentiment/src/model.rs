use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use echowatch_common::SentimentLabel;

use crate::lexical::round2;

/// Response item from the inference endpoint. Some deployments name the
/// field `label`, older ones `sentiment`.
#[derive(Debug, Deserialize)]
pub struct ModelPrediction {
    #[serde(alias = "sentiment")]
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    results: Vec<ModelPrediction>,
}

/// Client for the remote sentiment-inference endpoint. Built once and
/// reused for the whole run.
pub struct ModelClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ModelClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build sentiment HTTP client"),
        }
    }

    /// Classify one cleaned text. Returns None on any failure so the
    /// caller can fall back to neutral.
    pub async fn classify(&self, cleaned: &str) -> Option<(SentimentLabel, f64)> {
        let body = serde_json::json!({ "texts": [cleaned] });

        let resp = match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Sentiment model request failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), "Sentiment model returned error status");
            return None;
        }

        let parsed: ModelResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to parse sentiment model response");
                return None;
            }
        };

        let pred = parsed.results.into_iter().next()?;
        Some((normalize_label(&pred.label), round2(pred.score)))
    }
}

/// Map a model-specific label vocabulary onto the three-way scheme.
/// Handles `pos*/neg*/neu*` prefixes and the ordinal `LABEL_n` scheme
/// where 0/1/2 mean negative/neutral/positive. Anything unrecognized
/// is neutral.
pub fn normalize_label(raw: &str) -> SentimentLabel {
    let lower = raw.to_lowercase();
    if lower.starts_with("pos") || lower.contains("positive") {
        return SentimentLabel::Positive;
    }
    if lower.starts_with("neg") || lower.contains("negative") {
        return SentimentLabel::Negative;
    }
    if lower.starts_with("neu") || lower.contains("neutral") {
        return SentimentLabel::Neutral;
    }
    if let Some(idx) = lower.strip_prefix("label_").and_then(|n| n.parse::<u8>().ok()) {
        return match idx {
            0 => SentimentLabel::Negative,
            2 => SentimentLabel::Positive,
            _ => SentimentLabel::Neutral,
        };
    }
    SentimentLabel::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefix_vocabularies() {
        assert_eq!(normalize_label("POSITIVE"), SentimentLabel::Positive);
        assert_eq!(normalize_label("Negative"), SentimentLabel::Negative);
        assert_eq!(normalize_label("neu"), SentimentLabel::Neutral);
    }

    #[test]
    fn normalizes_ordinal_vocabulary() {
        assert_eq!(normalize_label("LABEL_0"), SentimentLabel::Negative);
        assert_eq!(normalize_label("LABEL_1"), SentimentLabel::Neutral);
        assert_eq!(normalize_label("LABEL_2"), SentimentLabel::Positive);
        assert_eq!(normalize_label("LABEL_7"), SentimentLabel::Neutral);
    }

    #[test]
    fn unknown_labels_fall_back_to_neutral() {
        assert_eq!(normalize_label("mixed"), SentimentLabel::Neutral);
        assert_eq!(normalize_label(""), SentimentLabel::Neutral);
    }

    #[test]
    fn prediction_accepts_both_field_names() {
        let a: ModelPrediction = serde_json::from_str(r#"{"label":"positive","score":0.9}"#).unwrap();
        let b: ModelPrediction = serde_json::from_str(r#"{"sentiment":"negative","score":0.8}"#).unwrap();
        assert_eq!(a.label, "positive");
        assert_eq!(b.label, "negative");
    }
}
