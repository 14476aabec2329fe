use std::collections::BTreeSet;
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use echowatch_common::{ConnectorStats, WriteOutcome};
use echowatch_store::{sources, Store};

use crate::http;

/// Meta-communities that show up in every result set and mean nothing.
const STOP_LIST: [&str; 4] = ["all", "popular", "announcements", "reddit"];

const SEARCH_URL: &str = "https://www.reddit.com/search.json";
const SEARCH_LIMIT: u32 = 25;
const SEARCH_DELAY: Duration = Duration::from_secs(2);

/// Pull community names out of result URLs. Names are lower-cased and
/// deduplicated; stop-listed names are dropped.
fn extract_communities(text: &str) -> Vec<String> {
    let pattern = Regex::new(r"reddit\.com/r/([a-zA-Z0-9_]+)/").expect("valid community regex");
    let mut seen = BTreeSet::new();
    for cap in pattern.captures_iter(text) {
        if let Some(name) = cap.get(1) {
            let name = name.as_str().to_lowercase();
            if !STOP_LIST.contains(&name.as_str()) {
                seen.insert(name);
            }
        }
    }
    seen.into_iter().collect()
}

/// Finds communities discussing the tracked entity and records them for
/// the NEXT run's connector set. Discovery never changes the current
/// run's fetch list.
pub struct DiscoveryLoop {
    keywords: Vec<String>,
    allow_list: Vec<String>,
    configured: BTreeSet<String>,
    client: reqwest::Client,
}

impl DiscoveryLoop {
    pub fn new(
        keywords: Vec<String>,
        allow_list: Vec<String>,
        configured_communities: &[String],
        client: reqwest::Client,
    ) -> Self {
        Self {
            keywords,
            allow_list,
            configured: configured_communities
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            client,
        }
    }

    async fn search(&self, url: &str, query: &str) -> Option<String> {
        let limit = SEARCH_LIMIT.to_string();
        let req = self
            .client
            .get(url)
            .query(&[("q", query), ("limit", limit.as_str())]);
        match http::send_with_retry(req).await {
            Ok(resp) => match resp.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(error = %e, "Failed to read search response");
                    None
                }
            },
            Err(e) => {
                warn!(query, error = %e, "Community search failed");
                None
            }
        }
    }

    pub async fn run(&self, store: &Store) -> ConnectorStats {
        let mut stats = ConnectorStats::default();
        let mut candidates: BTreeSet<String> = BTreeSet::new();

        // Sitewide sweep for each keyword.
        for keyword in &self.keywords {
            if let Some(body) = self.search(SEARCH_URL, keyword).await {
                stats.fetched += 1;
                candidates.extend(extract_communities(&body));
            } else {
                stats.failed += 1;
            }
            tokio::time::sleep(SEARCH_DELAY).await;
        }

        // Targeted sweep inside the allow-list communities.
        for community in &self.allow_list {
            let url = format!("https://www.reddit.com/r/{community}/search.json");
            for keyword in &self.keywords {
                if let Some(body) = self.search(&url, keyword).await {
                    stats.fetched += 1;
                    candidates.extend(extract_communities(&body));
                } else {
                    stats.failed += 1;
                }
                tokio::time::sleep(SEARCH_DELAY).await;
            }
        }

        // Already-connected communities are not discoveries.
        let known: BTreeSet<String> = match sources::active_names(store.pool()).await {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load known sources");
                BTreeSet::new()
            }
        };

        for name in candidates {
            if self.configured.contains(&name) || known.contains(&name) {
                stats.skipped += 1;
                continue;
            }
            match sources::insert_discovered(store.pool(), &name).await {
                Ok(WriteOutcome::Inserted) => {
                    info!(community = %name, "Discovered new community");
                    stats.inserted += 1;
                }
                Ok(WriteOutcome::Duplicate) => stats.duplicates += 1,
                Err(e) => {
                    warn!(community = %name, error = %e, "Failed to record discovery");
                    stats.failed += 1;
                }
            }
        }

        info!(%stats, "Discovery complete");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_normalizes_community_names() {
        let body = r#"{"permalink": "https://www.reddit.com/r/RustLang/comments/1",
                       "url": "https://old.reddit.com/r/embedded/comments/2"}"#;
        assert_eq!(
            extract_communities(body),
            vec!["embedded".to_string(), "rustlang".to_string()]
        );
    }

    #[test]
    fn stop_listed_names_are_rejected() {
        let body = "reddit.com/r/all/ reddit.com/r/popular/ reddit.com/r/announcements/ \
                    reddit.com/r/reddit/ reddit.com/r/sensors/";
        assert_eq!(extract_communities(body), vec!["sensors".to_string()]);
    }

    #[test]
    fn duplicate_names_collapse() {
        let body = "reddit.com/r/sensors/a reddit.com/r/Sensors/b reddit.com/r/SENSORS/c";
        assert_eq!(extract_communities(body), vec!["sensors".to_string()]);
    }

    #[test]
    fn names_without_trailing_slash_do_not_match() {
        assert!(extract_communities("reddit.com/r/partial").is_empty());
    }
}
