use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};

use echowatch_common::week::{week_end, week_start};
use echowatch_common::Platform;
use echowatch_sentiment::SentimentAnalyzer;
use echowatch_store::{mentions, metrics, Store};

const PLATFORMS: [Platform; 3] = [Platform::News, Platform::Microblog, Platform::LinkAggregator];

/// Feeds and the recent-search window deliver mentions posted up to a
/// week before ingestion, so daily rollups recompute this many
/// trailing days on every run.
const ROLLUP_WINDOW_DAYS: i64 = 7;

/// The trailing window of daily partitions ending at `today`, oldest
/// first.
fn rollup_dates(today: NaiveDate) -> Vec<NaiveDate> {
    (0..ROLLUP_WINDOW_DAYS)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .collect()
}

/// Recompute the trailing window's per-platform rollups and the
/// snapshot of every week that window touches. Safe to run any number
/// of times; the inputs fully determine the outputs.
pub async fn run_rollups(store: &Store) -> Result<()> {
    let dates = rollup_dates(Utc::now().date_naive());
    let weeks: BTreeSet<NaiveDate> = dates.iter().map(|date| week_start(*date)).collect();

    for platform in PLATFORMS {
        for date in &dates {
            recompute_sentiment(store, *date, platform).await?;
            recompute_daily_engagement(store, *date, platform).await?;
        }
        for monday in &weeks {
            recompute_weekly_platform(store, *monday, platform).await?;
        }
    }

    for monday in &weeks {
        metrics::recompute_weekly_snapshot(store.pool(), *monday, week_end(*monday)).await?;
    }
    info!(days = dates.len(), weeks = weeks.len(), "Rollups recomputed");
    Ok(())
}

/// Recompute sentiment counts for one (date, platform) partition from
/// the raw mention rows.
pub async fn recompute_sentiment(store: &Store, date: NaiveDate, platform: Platform) -> Result<()> {
    let rows = mentions::sentiment_rows(store.pool(), date, platform).await?;
    let summary = metrics::summarize_sentiment(&rows);
    metrics::upsert_sentiment_metrics(store.pool(), date, platform, &summary).await
}

async fn recompute_daily_engagement(store: &Store, date: NaiveDate, platform: Platform) -> Result<()> {
    let (count, engagement) = mentions::daily_totals(store.pool(), date, platform).await?;
    let followers = metrics::daily_follower_count(store.pool(), date, platform).await?;
    let rate = metrics::engagement_rate(engagement, followers);
    metrics::upsert_daily_platform(store.pool(), date, platform, followers, count, rate).await
}

async fn recompute_weekly_platform(
    store: &Store,
    monday: NaiveDate,
    platform: Platform,
) -> Result<()> {
    let (count, engagement) = mentions::weekly_totals(store.pool(), monday, platform).await?;
    let followers =
        metrics::daily_follower_count(store.pool(), Utc::now().date_naive(), platform).await?;
    let rate = metrics::engagement_rate(engagement, followers);
    metrics::upsert_weekly_platform(store.pool(), monday, platform, followers, count, rate).await
}

/// Backfill cycle: classify the trailing week's unanalyzed mentions,
/// then recompute sentiment rollups for every partition a mention
/// landed in.
pub async fn sweep_sentiment(store: &Store, analyzer: &SentimentAnalyzer) -> Result<()> {
    let since = week_start(Utc::now().date_naive() - Duration::days(7));
    let pending = mentions::unanalyzed_since(store.pool(), since).await?;
    info!(count = pending.len(), since = %since, "Sweeping unanalyzed mentions");

    let mut touched: BTreeSet<(NaiveDate, Platform)> = BTreeSet::new();
    let mut analyzed = 0u32;

    for mention in &pending {
        let (label, score) = analyzer.classify(&mention.body_text).await;
        match mentions::update_sentiment(store.pool(), mention.id, label, score, Utc::now()).await {
            Ok(()) => {
                analyzed += 1;
                touched.insert((mention.posted_at.date_naive(), mention.platform));
            }
            Err(e) => {
                warn!(error = %e, mention_id = mention.id, "Failed to record sentiment");
            }
        }
    }

    for (date, platform) in &touched {
        if let Err(e) = recompute_sentiment(store, *date, *platform).await {
            warn!(error = %e, %date, platform = %platform, "Failed to recompute sentiment rollup");
        }
    }

    info!(analyzed, partitions = touched.len(), "Sweep complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn rollup_window_covers_backdated_mentions() {
        let dates = rollup_dates(d(2026, 8, 28));
        assert_eq!(dates.len(), ROLLUP_WINDOW_DAYS as usize);
        assert_eq!(dates.first(), Some(&d(2026, 8, 22)));
        assert_eq!(dates.last(), Some(&d(2026, 8, 28)));
        // A mention posted Wednesday and ingested Friday stays inside
        // the window, so its daily partition is recomputed.
        assert!(dates.contains(&d(2026, 8, 26)));
    }

    #[test]
    fn rollup_window_spans_week_boundaries() {
        // 2026-08-26 is a Wednesday; the window reaches back into the
        // previous week, so both Mondays get their snapshot refreshed.
        let weeks: BTreeSet<NaiveDate> = rollup_dates(d(2026, 8, 26))
            .iter()
            .map(|date| week_start(*date))
            .collect();
        assert_eq!(
            weeks.into_iter().collect::<Vec<_>>(),
            vec![d(2026, 8, 17), d(2026, 8, 24)]
        );
    }
}
