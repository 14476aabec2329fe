use regex::{Regex, RegexBuilder};

/// Strip HTML/markup tags and decode the handful of entities that show
/// up in feed snippets.
pub fn strip_markup(input: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("valid tag regex");
    let stripped = tag_re.replace_all(input, "");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    input.chars().take(max).collect()
}

/// Case-insensitive keyword matcher. `matches` uses exact word
/// boundaries; it exists to suppress the fuzzy-match false positives
/// the scraping fallback is prone to, and must always run against the
/// full untruncated text.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    patterns: Vec<Regex>,
}

impl RelevanceFilter {
    pub fn new(keywords: &[String]) -> Self {
        let patterns = keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| {
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(k.trim())))
                    .case_insensitive(true)
                    .build()
                    .expect("valid keyword regex")
            })
            .collect();
        Self { patterns }
    }

    /// True when any keyword appears as a whole word in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// Host portion of a URL, for attributing a news item when the feed
/// entry carries no source name.
pub fn url_host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markup_removes_tags_and_entities() {
        let input = "<b>Report</b>: the org &amp; partners <a href=\"x\">announced</a>";
        assert_eq!(strip_markup(input), "Report: the org & partners announced");
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
    }

    #[test]
    fn relevance_requires_word_boundaries() {
        let filter = RelevanceFilter::new(&["acme".to_string()]);
        assert!(filter.matches("Heard about Acme today"));
        assert!(filter.matches("ACME: the announcement"));
        // Substring inside a longer word is the fuzzy false positive
        // this filter exists to reject.
        assert!(!filter.matches("macademia nuts"));
        assert!(!filter.matches("acmeology is not a word"));
    }

    #[test]
    fn relevance_match_found_only_past_truncation_offset_still_counts() {
        let filter = RelevanceFilter::new(&["acme".to_string()]);
        let padding = "x".repeat(600);
        let text = format!("{padding} acme appears late");
        // Filtering happens on the full text; a caller truncating to 500
        // chars for storage must have already passed the text through here.
        assert!(filter.matches(&text));
        assert!(!filter.matches(&truncate_chars(&text, 500)));
    }

    #[test]
    fn url_host_extracts_domain() {
        assert_eq!(
            url_host("https://news.example.org/story/1?ref=rss"),
            Some("news.example.org".to_string())
        );
        assert_eq!(url_host("not a url"), None);
    }
}
