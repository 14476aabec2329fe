use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use echowatch_common::text::RelevanceFilter;
use echowatch_common::week::week_start;
use echowatch_common::{CitationType, CitationWork, ConnectorStats, FetchError};
use echowatch_store::{citations, Store};

use crate::http;

const API_URL: &str = "https://api.openalex.org/works";
const PAGE_SIZE: u32 = 200;
const MAX_PAGES: u32 = 5;

/// URL checks per run for the liveness sweep.
const LIVENESS_MAX_CHECKS: usize = 25;

// ---------------------------------------------------------------------------
// Citation API wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<ApiWork>,
}

#[derive(Debug, Deserialize)]
struct ApiWork {
    id: String,
    doi: Option<String>,
    display_name: Option<String>,
    title: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    cited_by_count: i32,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_location: Option<Location>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
    #[serde(default)]
    raw_affiliation_strings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    landing_page_url: Option<String>,
}

impl ApiWork {
    /// Short work id from the full id URL.
    fn work_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    fn title_text(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("")
    }

    fn authors(&self) -> String {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref().and_then(|au| au.display_name.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn source_url(&self) -> String {
        self.primary_location
            .as_ref()
            .and_then(|l| l.landing_page_url.clone())
            .or_else(|| self.doi.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

// ---------------------------------------------------------------------------
// Pure helpers (kept out of the fetch loop so they can be tested)
// ---------------------------------------------------------------------------

/// Reassemble an abstract from the inverted-index form the API returns.
fn invert_abstract(index: &HashMap<String, Vec<u32>>) -> String {
    let mut positions: Vec<(u32, &str)> = index
        .iter()
        .flat_map(|(word, at)| at.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positions.sort();
    positions
        .into_iter()
        .map(|(_, w)| w)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decide whether a work is actually about the organization or just
/// happens to use its name as an ordinary word. Affiliation strings are
/// the strongest signal; the title and abstract back them up.
fn classify_work(work: &ApiWork, filter: &RelevanceFilter) -> CitationType {
    let affiliations: String = work
        .authorships
        .iter()
        .flat_map(|a| a.raw_affiliation_strings.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    if filter.matches(&affiliations) {
        return CitationType::Organization;
    }

    let abstract_text = work
        .abstract_inverted_index
        .as_ref()
        .map(invert_abstract)
        .unwrap_or_default();
    if filter.matches(work.title_text()) || filter.matches(&abstract_text) {
        CitationType::Organization
    } else {
        CitationType::WordUsage
    }
}

/// Week-over-week growth. A drop (retired duplicates, dead links)
/// never reads as negative growth.
fn new_citation_count(total: i64, previous: i64) -> i64 {
    (total - previous).max(0)
}

fn normalized_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Total order over duplicate candidates; the first element of a sorted
/// group is the keeper. Live URL first, then newer publication date
/// with missing dates sorting last, then newer record, then the id as a
/// deterministic tie-break.
fn duplicate_order(a: &CitationWork, b: &CitationWork) -> Ordering {
    a.is_dead
        .cmp(&b.is_dead)
        .then_with(|| match (a.publication_date, b.publication_date) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.work_id.cmp(&b.work_id))
}

/// Group works sharing a DOI or a normalized title and return the
/// work_ids that lost their group.
fn duplicate_losers(works: &[CitationWork]) -> Vec<String> {
    let mut groups: HashMap<String, Vec<&CitationWork>> = HashMap::new();
    for work in works {
        let key = match &work.doi {
            Some(doi) if !doi.is_empty() => format!("doi:{}", doi.to_lowercase()),
            _ => format!("title:{}", normalized_title(&work.title)),
        };
        groups.entry(key).or_default().push(work);
    }

    let mut losers = Vec::new();
    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| duplicate_order(a, b));
        for loser in &group[1..] {
            losers.push(loser.work_id.clone());
        }
    }
    losers.sort();
    losers
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Citation-graph connector: harvest works, classify, resolve
/// duplicates, sweep dead links, and roll up the weekly totals.
pub struct CitationsConnector {
    ror_id: Option<String>,
    entity_name: String,
    filter: RelevanceFilter,
    contact_email: String,
    client: reqwest::Client,
}

impl CitationsConnector {
    pub fn new(
        ror_id: Option<String>,
        entity_name: String,
        filter: RelevanceFilter,
        contact_email: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            ror_id,
            entity_name,
            filter,
            contact_email,
            client,
        }
    }

    fn query_filter(&self) -> String {
        match &self.ror_id {
            Some(ror) => format!("authorships.institutions.ror:{ror}"),
            None => format!("raw_affiliation_strings.search:\"{}\"", self.entity_name),
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<WorksResponse, FetchError> {
        let filter = self.query_filter();
        let per_page = PAGE_SIZE.to_string();
        let page = page.to_string();
        let req = self.client.get(API_URL).query(&[
            ("filter", filter.as_str()),
            ("per-page", per_page.as_str()),
            ("page", page.as_str()),
            ("mailto", self.contact_email.as_str()),
        ]);
        let resp = http::send_with_retry(req).await?;
        resp.json::<WorksResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    async fn harvest(&self, store: &Store, stats: &mut ConnectorStats) {
        for page in 1..=MAX_PAGES {
            let response = match self.fetch_page(page).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(page, error = %e, "Citation page fetch failed");
                    stats.failed += 1;
                    return;
                }
            };
            let done = (response.results.len() as u32) < PAGE_SIZE;

            for api_work in response.results {
                stats.fetched += 1;

                if api_work.title_text().is_empty() {
                    stats.skipped += 1;
                    continue;
                }

                let work = CitationWork {
                    work_id: api_work.work_id().to_string(),
                    doi: api_work.doi.clone(),
                    title: api_work.title_text().to_string(),
                    authors: api_work.authors(),
                    publication_date: api_work
                        .publication_date
                        .as_deref()
                        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                    cited_by_count: api_work.cited_by_count,
                    source_url: api_work.source_url(),
                    is_dead: false,
                    citation_type: classify_work(&api_work, &self.filter),
                    updated_at: Utc::now(),
                };

                match citations::upsert_work(store.pool(), &work).await {
                    Ok(()) => stats.inserted += 1,
                    Err(e) => {
                        warn!(error = %e, work_id = %work.work_id, "Failed to store citation work");
                        stats.failed += 1;
                    }
                }
            }

            if done {
                break;
            }
        }
    }

    async fn resolve_duplicates(&self, store: &Store) {
        let works = match citations::live_works(store.pool()).await {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "Failed to load works for duplicate resolution");
                return;
            }
        };

        let losers = duplicate_losers(&works);
        for work_id in &losers {
            if let Err(e) = citations::mark_dead(store.pool(), work_id).await {
                warn!(error = %e, work_id = %work_id, "Failed to mark duplicate dead");
            }
        }
        if !losers.is_empty() {
            info!(count = losers.len(), "Resolved duplicate citation works");
        }
    }

    /// HEAD-check a bounded slice of source URLs and retire works whose
    /// pages are gone. Transient failures are left alone; only a
    /// definitive gone status retires a work.
    async fn liveness_sweep(&self, store: &Store) {
        let works = match citations::live_works(store.pool()).await {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "Failed to load works for liveness sweep");
                return;
            }
        };

        let mut checked = 0usize;
        let mut retired = 0usize;
        for work in works.iter().take(LIVENESS_MAX_CHECKS) {
            checked += 1;
            let status = match self.client.head(&work.source_url).send().await {
                Ok(resp) => resp.status().as_u16(),
                Err(_) => continue,
            };
            if matches!(status, 404 | 410) {
                if let Err(e) = citations::mark_dead(store.pool(), &work.work_id).await {
                    warn!(error = %e, work_id = %work.work_id, "Failed to retire dead link");
                } else {
                    retired += 1;
                }
            }
        }
        info!(checked, retired, "Liveness sweep complete");
    }

    async fn rollup_week(&self, store: &Store) {
        let week = week_start(Utc::now().date_naive());

        let (total_citations, total_works) = match citations::live_totals(store.pool()).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Failed to read citation totals");
                return;
            }
        };
        let previous = match citations::previous_total(store.pool(), week).await {
            Ok(p) => p.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "Failed to read previous citation total");
                return;
            }
        };
        let new_citations = new_citation_count(total_citations, previous);

        if let Err(e) = citations::upsert_citation_metrics(
            store.pool(),
            week,
            total_citations,
            new_citations,
            total_works,
        )
        .await
        {
            warn!(error = %e, "Failed to store citation metrics");
        } else {
            info!(
                week_start = %week,
                total_citations,
                new_citations,
                total_works,
                "Citation metrics rolled up"
            );
        }
    }

    pub async fn fetch(&self, store: &Store) -> ConnectorStats {
        let mut stats = ConnectorStats::default();

        self.harvest(store, &mut stats).await;
        self.resolve_duplicates(store).await;
        self.liveness_sweep(store).await;
        self.rollup_week(store).await;

        info!(%stats, "Citations processed");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn filter() -> RelevanceFilter {
        RelevanceFilter::new(&["acme".to_string()])
    }

    fn work(id: &str, doi: Option<&str>, pub_date: Option<(i32, u32, u32)>, updated_secs: i64) -> CitationWork {
        CitationWork {
            work_id: id.to_string(),
            doi: doi.map(|d| d.to_string()),
            title: "A Study of Distributed Sensors".to_string(),
            authors: "A. Author".to_string(),
            publication_date: pub_date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            cited_by_count: 1,
            source_url: "https://example.org/w".to_string(),
            is_dead: false,
            citation_type: CitationType::Organization,
            updated_at: Utc.timestamp_opt(1_700_000_000 + updated_secs, 0).unwrap(),
        }
    }

    #[test]
    fn abstract_reassembles_in_position_order() {
        let mut index = HashMap::new();
        index.insert("sensors".to_string(), vec![2]);
        index.insert("distributed".to_string(), vec![1]);
        index.insert("the".to_string(), vec![0, 3]);
        assert_eq!(invert_abstract(&index), "the distributed sensors the");
    }

    #[test]
    fn affiliation_match_classifies_as_organization() {
        let api_work = ApiWork {
            id: "https://api.example.org/W1".to_string(),
            doi: None,
            display_name: Some("Unrelated title".to_string()),
            title: None,
            publication_date: None,
            cited_by_count: 0,
            authorships: vec![Authorship {
                author: None,
                raw_affiliation_strings: vec!["Acme Research Institute".to_string()],
            }],
            primary_location: None,
            abstract_inverted_index: None,
        };
        assert_eq!(classify_work(&api_work, &filter()), CitationType::Organization);
    }

    #[test]
    fn no_signal_classifies_as_word_usage() {
        let api_work = ApiWork {
            id: "https://api.example.org/W2".to_string(),
            doi: None,
            display_name: Some("The acmeology of ordinary words".to_string()),
            title: None,
            publication_date: None,
            cited_by_count: 0,
            authorships: vec![],
            primary_location: None,
            abstract_inverted_index: None,
        };
        // "acmeology" is not a word-boundary match for "acme".
        assert_eq!(classify_work(&api_work, &filter()), CitationType::WordUsage);
    }

    #[test]
    fn citation_growth_clamps_at_zero() {
        assert_eq!(new_citation_count(120, 100), 20);
        assert_eq!(new_citation_count(100, 100), 0);
        // Totals can shrink when duplicates or dead links retire.
        assert_eq!(new_citation_count(80, 100), 0);
        // First run has no previous total.
        assert_eq!(new_citation_count(50, 0), 50);
    }

    #[test]
    fn duplicate_order_prefers_newer_publication_date() {
        let newer = work("W1", None, Some((2025, 6, 1)), 0);
        let older = work("W2", None, Some((2024, 1, 1)), 100);
        assert_eq!(duplicate_order(&newer, &older), Ordering::Less);
    }

    #[test]
    fn duplicate_order_sorts_missing_dates_last() {
        let dated = work("W1", None, Some((2020, 1, 1)), 0);
        let undated = work("W2", None, None, 100);
        assert_eq!(duplicate_order(&dated, &undated), Ordering::Less);
        assert_eq!(duplicate_order(&undated, &dated), Ordering::Greater);
    }

    #[test]
    fn duplicate_order_on_two_missing_dates_falls_back_to_updated_at() {
        let fresher = work("W1", None, None, 500);
        let staler = work("W2", None, None, 0);
        assert_eq!(duplicate_order(&fresher, &staler), Ordering::Less);
        // Equal on every field but id: the id decides, deterministically.
        let a = work("W1", None, None, 0);
        let b = work("W2", None, None, 0);
        assert_eq!(duplicate_order(&a, &b), Ordering::Less);
    }

    #[test]
    fn duplicate_losers_keeps_one_work_per_doi_group() {
        let works = vec![
            work("W1", Some("10.1/x"), Some((2025, 6, 1)), 0),
            work("W2", Some("10.1/x"), Some((2024, 1, 1)), 0),
            work("W3", Some("10.2/y"), None, 0),
        ];
        assert_eq!(duplicate_losers(&works), vec!["W2".to_string()]);
    }

    #[test]
    fn duplicate_losers_groups_by_normalized_title_without_doi() {
        let mut a = work("W1", None, Some((2025, 1, 1)), 0);
        let mut b = work("W2", None, Some((2023, 1, 1)), 0);
        a.title = "A Study of Distributed Sensors!".to_string();
        b.title = "a study  of distributed sensors".to_string();
        assert_eq!(duplicate_losers(&[a, b]), vec!["W2".to_string()]);
    }

    #[test]
    fn work_id_strips_the_id_url_prefix() {
        let api_work = ApiWork {
            id: "https://api.example.org/works/W4242".to_string(),
            doi: None,
            display_name: None,
            title: None,
            publication_date: None,
            cited_by_count: 0,
            authorships: vec![],
            primary_location: None,
            abstract_inverted_index: None,
        };
        assert_eq!(api_work.work_id(), "W4242");
    }
}
