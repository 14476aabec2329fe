use echowatch_common::SentimentLabel;

/// Polarity above this is positive, below the negation is negative.
const POLARITY_THRESHOLD: f64 = 0.1;

/// VADER-backed scorer. Construction loads the full lexicon, so build
/// one and reuse it for the life of the analyzer.
pub struct LexicalScorer {
    analyzer: vader_sentiment::SentimentIntensityAnalyzer<'static>,
}

impl LexicalScorer {
    pub fn new() -> Self {
        Self {
            analyzer: vader_sentiment::SentimentIntensityAnalyzer::new(),
        }
    }

    /// Score already-cleaned text. Compound polarity lands in [-1, 1];
    /// the label applies the ±0.1 threshold and the score is rounded
    /// to 2 decimals.
    pub fn classify(&self, cleaned: &str) -> (SentimentLabel, f64) {
        if cleaned.is_empty() {
            return (SentimentLabel::Neutral, 0.0);
        }

        let scores = self.analyzer.polarity_scores(cleaned);
        let polarity = scores.get("compound").copied().unwrap_or(0.0);

        let label = if polarity > POLARITY_THRESHOLD {
            SentimentLabel::Positive
        } else if polarity < -POLARITY_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        (label, round2(polarity))
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral_zero() {
        assert_eq!(LexicalScorer::new().classify(""), (SentimentLabel::Neutral, 0.0));
    }

    #[test]
    fn clearly_positive_text_scores_positive() {
        let (label, score) =
            LexicalScorer::new().classify("This is a wonderful, excellent initiative and I love it");
        assert_eq!(label, SentimentLabel::Positive);
        assert!(score > POLARITY_THRESHOLD);
    }

    #[test]
    fn clearly_negative_text_scores_negative() {
        let (label, score) =
            LexicalScorer::new().classify("This is terrible, a horrible disgrace and I hate it");
        assert_eq!(label, SentimentLabel::Negative);
        assert!(score < -POLARITY_THRESHOLD);
    }

    #[test]
    fn flat_text_is_neutral() {
        let (label, _) = LexicalScorer::new().classify("The meeting is scheduled for Tuesday");
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn scores_are_rounded_to_two_decimals() {
        let (_, score) = LexicalScorer::new().classify("good");
        assert_eq!(score, round2(score));
    }

    #[test]
    fn one_scorer_handles_many_texts() {
        // The lexicon loads once at construction; repeated calls score
        // against the same instance.
        let scorer = LexicalScorer::new();
        let (first, _) = scorer.classify("I love this");
        let (second, _) = scorer.classify("I hate this");
        assert_eq!(first, SentimentLabel::Positive);
        assert_eq!(second, SentimentLabel::Negative);
    }
}
