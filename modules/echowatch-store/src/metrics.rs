use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;

use echowatch_common::{GeoMetric, Platform, SiteMetrics, TopPage};

// ---------------------------------------------------------------------------
// Pure rollup math (unit-tested without a database)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
pub struct SentimentSummary {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub unanalyzed: i64,
    pub average_score: Option<f64>,
}

/// Tally (label, score) pairs from a mention partition. A NULL or
/// unrecognized label counts as unanalyzed; the average covers only
/// rows that carry a score.
pub fn summarize_sentiment(rows: &[(Option<String>, Option<f64>)]) -> SentimentSummary {
    let mut summary = SentimentSummary::default();
    let mut score_sum = 0.0;
    let mut score_count = 0u32;

    for (label, score) in rows {
        match label.as_deref() {
            Some("positive") => summary.positive += 1,
            Some("negative") => summary.negative += 1,
            Some("neutral") => summary.neutral += 1,
            _ => summary.unanalyzed += 1,
        }
        if let Some(s) = score {
            score_sum += s;
            score_count += 1;
        }
    }

    if score_count > 0 {
        summary.average_score = Some(score_sum / score_count as f64);
    }
    summary
}

/// Engagement as a percentage of the audience. Zero or unknown
/// followers means the rate is exactly zero, never a division error.
pub fn engagement_rate(total_engagement: i64, followers: Option<i32>) -> f64 {
    match followers {
        Some(f) if f > 0 => total_engagement as f64 / f as f64 * 100.0,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Rollup upserts
// ---------------------------------------------------------------------------

pub async fn upsert_daily_platform(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
    follower_count: Option<i32>,
    mentions_count: i64,
    engagement_rate: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_platform_metrics
            (date, platform, follower_count, mentions_count, engagement_rate)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (date, platform) DO UPDATE
            SET follower_count = COALESCE(EXCLUDED.follower_count,
                                          daily_platform_metrics.follower_count),
                mentions_count = EXCLUDED.mentions_count,
                engagement_rate = EXCLUDED.engagement_rate
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .bind(follower_count)
    .bind(mentions_count)
    .bind(engagement_rate)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the follower count without disturbing mention counts the
/// aggregator owns.
pub async fn set_daily_follower_count(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
    follower_count: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_platform_metrics (date, platform, follower_count)
        VALUES ($1, $2, $3)
        ON CONFLICT (date, platform) DO UPDATE
            SET follower_count = EXCLUDED.follower_count
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .bind(follower_count)
    .execute(pool)
    .await?;
    Ok(())
}

/// Today's recorded follower count, if any. Used to skip the follower
/// lookup when a run earlier in the day already paid for it.
pub async fn daily_follower_count(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
) -> Result<Option<i32>> {
    let row = sqlx::query_as::<_, (Option<i32>,)>(
        r#"
        SELECT follower_count
        FROM daily_platform_metrics
        WHERE date = $1 AND platform = $2
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|(f,)| f))
}

pub async fn upsert_weekly_platform(
    pool: &PgPool,
    week_start: NaiveDate,
    platform: Platform,
    follower_count: Option<i32>,
    mentions_count: i64,
    engagement_rate: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weekly_platform_metrics
            (week_start_date, platform, follower_count, mentions_count, engagement_rate)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (week_start_date, platform) DO UPDATE
            SET follower_count = COALESCE(EXCLUDED.follower_count,
                                          weekly_platform_metrics.follower_count),
                mentions_count = EXCLUDED.mentions_count,
                engagement_rate = EXCLUDED.engagement_rate
        "#,
    )
    .bind(week_start)
    .bind(platform.as_str())
    .bind(follower_count)
    .bind(mentions_count)
    .bind(engagement_rate)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_sentiment_metrics(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
    summary: &SentimentSummary,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sentiment_metrics
            (date, platform, positive_count, negative_count, neutral_count,
             unanalyzed_count, average_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (date, platform) DO UPDATE
            SET positive_count = EXCLUDED.positive_count,
                negative_count = EXCLUDED.negative_count,
                neutral_count = EXCLUDED.neutral_count,
                unanalyzed_count = EXCLUDED.unanalyzed_count,
                average_score = EXCLUDED.average_score
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .bind(summary.positive)
    .bind(summary.negative)
    .bind(summary.neutral)
    .bind(summary.unanalyzed)
    .bind(summary.average_score)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_site_metrics(pool: &PgPool, metrics: &SiteMetrics) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO site_metrics
            (week_start_date, sessions, total_users, new_users, returning_users,
             pageviews, avg_session_duration, bounce_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (week_start_date) DO UPDATE
            SET sessions = EXCLUDED.sessions,
                total_users = EXCLUDED.total_users,
                new_users = EXCLUDED.new_users,
                returning_users = EXCLUDED.returning_users,
                pageviews = EXCLUDED.pageviews,
                avg_session_duration = EXCLUDED.avg_session_duration,
                bounce_rate = EXCLUDED.bounce_rate
        "#,
    )
    .bind(metrics.week_start_date)
    .bind(metrics.sessions)
    .bind(metrics.total_users)
    .bind(metrics.new_users)
    .bind(metrics.returning_users)
    .bind(metrics.pageviews)
    .bind(metrics.avg_session_duration)
    .bind(metrics.bounce_rate)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_top_page(pool: &PgPool, page: &TopPage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO top_pages (week_start_date, page_path, pageviews, avg_time_on_page)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (week_start_date, page_path) DO UPDATE
            SET pageviews = EXCLUDED.pageviews,
                avg_time_on_page = EXCLUDED.avg_time_on_page
        "#,
    )
    .bind(page.week_start_date)
    .bind(&page.page_path)
    .bind(page.pageviews)
    .bind(page.avg_time_on_page)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_geo_metric(pool: &PgPool, geo: &GeoMetric) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO geo_metrics (week_start_date, country, sessions, users)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (week_start_date, country) DO UPDATE
            SET sessions = EXCLUDED.sessions,
                users = EXCLUDED.users
        "#,
    )
    .bind(geo.week_start_date)
    .bind(&geo.country)
    .bind(geo.sessions)
    .bind(geo.users)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recompute the week's headline snapshot from already-rolled-up tables
/// plus the mentions partition. Pure SQL, idempotent.
pub async fn recompute_weekly_snapshot(
    pool: &PgPool,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weekly_snapshots
            (week_start_date, week_end_date, total_news_mentions,
             total_social_mentions, total_citations, total_sessions)
        VALUES (
            $1,
            $2,
            (SELECT COUNT(*) FROM mentions
             WHERE week_start_date = $1 AND platform = 'news'),
            (SELECT COUNT(*) FROM mentions
             WHERE week_start_date = $1 AND platform IN ('microblog', 'linkagg')),
            COALESCE((SELECT total_citations FROM citation_metrics
                      WHERE week_start_date = $1), 0),
            COALESCE((SELECT sessions FROM site_metrics
                      WHERE week_start_date = $1), 0)
        )
        ON CONFLICT (week_start_date) DO UPDATE
            SET week_end_date = EXCLUDED.week_end_date,
                total_news_mentions = EXCLUDED.total_news_mentions,
                total_social_mentions = EXCLUDED.total_social_mentions,
                total_citations = EXCLUDED.total_citations,
                total_sessions = EXCLUDED.total_sessions
        "#,
    )
    .bind(week_start)
    .bind(week_end)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: Option<&str>, score: Option<f64>) -> (Option<String>, Option<f64>) {
        (label.map(|s| s.to_string()), score)
    }

    #[test]
    fn summarize_counts_labels_and_averages_scores() {
        let rows = vec![
            row(Some("positive"), Some(0.8)),
            row(Some("positive"), Some(0.6)),
            row(Some("negative"), Some(-0.4)),
            row(Some("neutral"), Some(0.0)),
            row(None, None),
        ];
        let summary = summarize_sentiment(&rows);
        assert_eq!(summary.positive, 2);
        assert_eq!(summary.negative, 1);
        assert_eq!(summary.neutral, 1);
        assert_eq!(summary.unanalyzed, 1);
        let avg = summary.average_score.unwrap();
        assert!((avg - 0.25).abs() < 1e-9);
    }

    #[test]
    fn summarize_empty_partition_has_no_average() {
        let summary = summarize_sentiment(&[]);
        assert_eq!(summary, SentimentSummary::default());
        assert!(summary.average_score.is_none());
    }

    #[test]
    fn unrecognized_label_counts_as_unanalyzed() {
        let rows = vec![row(Some("mixed"), Some(0.2))];
        let summary = summarize_sentiment(&rows);
        assert_eq!(summary.unanalyzed, 1);
        assert_eq!(summary.average_score, Some(0.2));
    }

    #[test]
    fn engagement_rate_is_a_percentage() {
        assert!((engagement_rate(50, Some(1000)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn engagement_rate_with_no_audience_is_zero() {
        assert_eq!(engagement_rate(120, Some(0)), 0.0);
        assert_eq!(engagement_rate(120, None), 0.0);
        assert_eq!(engagement_rate(0, Some(500)), 0.0);
    }
}
