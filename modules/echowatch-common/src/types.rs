use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a mention was seen. Stored as the lowercase string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    News,
    Microblog,
    LinkAggregator,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::News => "news",
            Platform::Microblog => "microblog",
            Platform::LinkAggregator => "linkagg",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "news" => Some(Platform::News),
            "microblog" => Some(Platform::Microblog),
            "linkagg" => Some(Platform::LinkAggregator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment label attached to a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized mention candidate produced by a connector, ready for the
/// persister. `natural_key` is the platform-specific dedup key: the
/// native post id for microblog/linkagg, the composed `url\ntitle` pair
/// for news.
#[derive(Debug, Clone)]
pub struct NewMention {
    pub platform: Platform,
    pub natural_key: String,
    pub author: String,
    pub body_text: String,
    pub source_url: String,
    pub posted_at: DateTime<Utc>,
    pub week_start_date: NaiveDate,
    pub likes: i32,
    pub reshares: i32,
    pub replies: i32,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_score: Option<f64>,
    pub sentiment_analyzed_at: Option<DateTime<Utc>>,
}

impl NewMention {
    /// Compose the news natural key from the (url, title) pair. A single
    /// URL can host several distinct alerts, so the URL alone is not
    /// unique. Newlines cannot survive feed normalization, so the
    /// separator is unambiguous.
    pub fn news_key(url: &str, title: &str) -> String {
        format!("{url}\n{title}")
    }
}

/// How a citation result relates to the tracked organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationType {
    /// Work affiliated with or discussing the organization itself.
    Organization,
    /// Incidental use of the name as an ordinary word.
    WordUsage,
}

impl CitationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationType::Organization => "organization",
            CitationType::WordUsage => "word_usage",
        }
    }

    pub fn parse(s: &str) -> Option<CitationType> {
        match s {
            "organization" => Some(CitationType::Organization),
            "word_usage" => Some(CitationType::WordUsage),
            _ => None,
        }
    }
}

/// An academic work citing or affiliated with the tracked organization.
#[derive(Debug, Clone)]
pub struct CitationWork {
    pub work_id: String,
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    pub publication_date: Option<NaiveDate>,
    pub cited_by_count: i32,
    pub source_url: String,
    pub is_dead: bool,
    pub citation_type: CitationType,
    pub updated_at: DateTime<Utc>,
}

/// One week of site-wide analytics, keyed by the Monday of the week.
#[derive(Debug, Clone, Default)]
pub struct SiteMetrics {
    pub week_start_date: NaiveDate,
    pub sessions: i64,
    pub total_users: i64,
    pub new_users: i64,
    pub returning_users: i64,
    pub pageviews: i64,
    pub avg_session_duration: f64,
    pub bounce_rate: f64,
}

/// One page's traffic for a week.
#[derive(Debug, Clone)]
pub struct TopPage {
    pub week_start_date: NaiveDate,
    pub page_path: String,
    pub pageviews: i64,
    pub avg_time_on_page: f64,
}

/// One country's traffic for a week.
#[derive(Debug, Clone)]
pub struct GeoMetric {
    pub week_start_date: NaiveDate,
    pub country: String,
    pub sessions: i64,
    pub users: i64,
}

/// Result of persisting one record: which branch the conditional
/// insert took. Drives the new/duplicate counters in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Duplicate,
}

/// Per-connector tally for one run. Connectors never abort the
/// pipeline; whatever they could not process shows up here instead.
#[derive(Debug, Default, Clone)]
pub struct ConnectorStats {
    pub fetched: u32,
    pub inserted: u32,
    pub duplicates: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl ConnectorStats {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::Duplicate => self.duplicates += 1,
        }
    }
}

impl std::fmt::Display for ConnectorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched={} inserted={} duplicates={} skipped={} failed={}",
            self.fetched, self.inserted, self.duplicates, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_string_form() {
        for p in [Platform::News, Platform::Microblog, Platform::LinkAggregator] {
            assert_eq!(Platform::parse(p.as_str()), Some(p));
        }
        assert_eq!(Platform::parse("telegraph"), None);
    }

    #[test]
    fn news_key_distinguishes_titles_on_same_url() {
        let a = NewMention::news_key("https://example.org/p", "First alert");
        let b = NewMention::news_key("https://example.org/p", "Second alert");
        assert_ne!(a, b);
    }

    #[test]
    fn connector_stats_count_both_write_branches() {
        let mut stats = ConnectorStats::default();
        stats.record(WriteOutcome::Inserted);
        stats.record(WriteOutcome::Duplicate);
        stats.record(WriteOutcome::Duplicate);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 2);
    }
}
