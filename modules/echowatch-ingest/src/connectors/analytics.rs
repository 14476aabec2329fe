use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use echowatch_common::week::{week_end, week_start};
use echowatch_common::{ConnectorStats, FetchError, GeoMetric, SiteMetrics, TopPage};
use echowatch_store::{metrics, Store};

use crate::http;

const TOP_PAGES_LIMIT: u32 = 20;
const GEO_LIMIT: u32 = 30;

// ---------------------------------------------------------------------------
// Reporting API wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(rename = "dimensionValues", default)]
    dimension_values: Vec<ReportValue>,
    #[serde(rename = "metricValues", default)]
    metric_values: Vec<ReportValue>,
}

#[derive(Debug, Deserialize)]
struct ReportValue {
    #[serde(default)]
    value: String,
}

impl ReportRow {
    fn dimension(&self, i: usize) -> &str {
        self.dimension_values.get(i).map(|v| v.value.as_str()).unwrap_or("")
    }

    fn metric_i64(&self, i: usize) -> i64 {
        self.metric_values
            .get(i)
            .and_then(|v| v.value.parse::<f64>().ok())
            .map(|f| f as i64)
            .unwrap_or(0)
    }

    fn metric_f64(&self, i: usize) -> f64 {
        self.metric_values
            .get(i)
            .and_then(|v| v.value.parse().ok())
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Web-analytics connector. Pulls the trailing Monday-anchored week in
/// three independent reports; one failing report never blocks the rest.
pub struct AnalyticsConnector {
    api_url: String,
    property_id: String,
    token: String,
    client: reqwest::Client,
}

impl AnalyticsConnector {
    pub fn new(api_url: String, property_id: String, token: String, client: reqwest::Client) -> Self {
        Self {
            api_url,
            property_id,
            token,
            client,
        }
    }

    async fn run_report(
        &self,
        week: (NaiveDate, NaiveDate),
        metrics: &[&str],
        dimensions: &[&str],
        limit: Option<u32>,
    ) -> Result<ReportResponse, FetchError> {
        let mut body = json!({
            "dateRanges": [{
                "startDate": week.0.to_string(),
                "endDate": week.1.to_string(),
            }],
            "metrics": metrics.iter().map(|m| json!({"name": m})).collect::<Vec<_>>(),
        });
        if !dimensions.is_empty() {
            body["dimensions"] = dimensions.iter().map(|d| json!({"name": d})).collect();
        }
        if let Some(limit) = limit {
            body["limit"] = json!(limit.to_string());
        }

        let url = format!(
            "{}/properties/{}:runReport",
            self.api_url.trim_end_matches('/'),
            self.property_id
        );
        let req = self.client.post(&url).bearer_auth(&self.token).json(&body);
        let resp = http::send_with_retry(req).await?;
        resp.json::<ReportResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    async fn fetch_site_metrics(
        &self,
        store: &Store,
        week: (NaiveDate, NaiveDate),
        stats: &mut ConnectorStats,
    ) {
        let report = match self
            .run_report(
                week,
                &[
                    "sessions",
                    "totalUsers",
                    "newUsers",
                    "screenPageViews",
                    "averageSessionDuration",
                    "bounceRate",
                ],
                &[],
                None,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Core analytics report failed");
                stats.failed += 1;
                return;
            }
        };
        stats.fetched += 1;

        let Some(row) = report.rows.first() else {
            info!("Core analytics report returned no rows");
            stats.skipped += 1;
            return;
        };

        let total_users = row.metric_i64(1);
        let new_users = row.metric_i64(2);
        let site = SiteMetrics {
            week_start_date: week.0,
            sessions: row.metric_i64(0),
            total_users,
            new_users,
            returning_users: (total_users - new_users).max(0),
            pageviews: row.metric_i64(3),
            avg_session_duration: row.metric_f64(4),
            bounce_rate: row.metric_f64(5),
        };

        match metrics::upsert_site_metrics(store.pool(), &site).await {
            Ok(()) => stats.inserted += 1,
            Err(e) => {
                warn!(error = %e, "Failed to store site metrics");
                stats.failed += 1;
            }
        }
    }

    async fn fetch_top_pages(
        &self,
        store: &Store,
        week: (NaiveDate, NaiveDate),
        stats: &mut ConnectorStats,
    ) {
        let report = match self
            .run_report(
                week,
                &["screenPageViews", "averageSessionDuration"],
                &["pagePath"],
                Some(TOP_PAGES_LIMIT),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Top-pages report failed");
                stats.failed += 1;
                return;
            }
        };
        stats.fetched += 1;

        for row in &report.rows {
            let page = TopPage {
                week_start_date: week.0,
                page_path: row.dimension(0).to_string(),
                pageviews: row.metric_i64(0),
                avg_time_on_page: row.metric_f64(1),
            };
            match metrics::upsert_top_page(store.pool(), &page).await {
                Ok(()) => stats.inserted += 1,
                Err(e) => {
                    warn!(error = %e, page = %page.page_path, "Failed to store top page");
                    stats.failed += 1;
                }
            }
        }
    }

    async fn fetch_geo(
        &self,
        store: &Store,
        week: (NaiveDate, NaiveDate),
        stats: &mut ConnectorStats,
    ) {
        let report = match self
            .run_report(week, &["sessions", "totalUsers"], &["country"], Some(GEO_LIMIT))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Geography report failed");
                stats.failed += 1;
                return;
            }
        };
        stats.fetched += 1;

        for row in &report.rows {
            let geo = GeoMetric {
                week_start_date: week.0,
                country: row.dimension(0).to_string(),
                sessions: row.metric_i64(0),
                users: row.metric_i64(1),
            };
            match metrics::upsert_geo_metric(store.pool(), &geo).await {
                Ok(()) => stats.inserted += 1,
                Err(e) => {
                    warn!(error = %e, country = %geo.country, "Failed to store geo metric");
                    stats.failed += 1;
                }
            }
        }
    }

    pub async fn fetch(&self, store: &Store) -> ConnectorStats {
        let mut stats = ConnectorStats::default();

        let monday = week_start(chrono::Utc::now().date_naive());
        let week = (monday, week_end(monday));

        self.fetch_site_metrics(store, week, &mut stats).await;
        self.fetch_top_pages(store, week, &mut stats).await;
        self.fetch_geo(store, week, &mut stats).await;

        info!(week_start = %week.0, %stats, "Analytics processed");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_rows_parse_string_encoded_values() {
        let raw = r#"{
            "rows": [{
                "dimensionValues": [{"value": "/about"}],
                "metricValues": [{"value": "1543"}, {"value": "72.5"}]
            }]
        }"#;
        let report: ReportResponse = serde_json::from_str(raw).unwrap();
        let row = &report.rows[0];
        assert_eq!(row.dimension(0), "/about");
        assert_eq!(row.metric_i64(0), 1543);
        assert!((row.metric_f64(1) - 72.5).abs() < 1e-9);
    }

    #[test]
    fn missing_rows_and_values_default_safely() {
        let report: ReportResponse = serde_json::from_str("{}").unwrap();
        assert!(report.rows.is_empty());

        let raw = r#"{"rows": [{}]}"#;
        let report: ReportResponse = serde_json::from_str(raw).unwrap();
        let row = &report.rows[0];
        assert_eq!(row.dimension(3), "");
        assert_eq!(row.metric_i64(0), 0);
    }
}
