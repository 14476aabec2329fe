use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use echowatch_common::{NewMention, Platform, SentimentLabel, WriteOutcome};

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert a mention if its (platform, natural_key) has not been seen.
/// Content and engagement are a snapshot from first sight; a later
/// fetch of the same record changes nothing.
pub async fn insert_mention(pool: &PgPool, mention: &NewMention) -> Result<WriteOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO mentions
            (platform, natural_key, author, body_text, source_url, posted_at,
             week_start_date, likes, reshares, replies,
             sentiment_label, sentiment_score, sentiment_analyzed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (platform, natural_key) DO NOTHING
        "#,
    )
    .bind(mention.platform.as_str())
    .bind(&mention.natural_key)
    .bind(&mention.author)
    .bind(&mention.body_text)
    .bind(&mention.source_url)
    .bind(mention.posted_at)
    .bind(mention.week_start_date)
    .bind(mention.likes)
    .bind(mention.reshares)
    .bind(mention.replies)
    .bind(mention.sentiment_label.map(|l| l.as_str()))
    .bind(mention.sentiment_score)
    .bind(mention.sentiment_analyzed_at)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        Ok(WriteOutcome::Inserted)
    } else {
        Ok(WriteOutcome::Duplicate)
    }
}

/// Attach a sentiment result to an existing mention (backfill sweep).
pub async fn update_sentiment(
    pool: &PgPool,
    mention_id: i64,
    label: SentimentLabel,
    score: f64,
    analyzed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE mentions
        SET sentiment_label = $2, sentiment_score = $3, sentiment_analyzed_at = $4
        WHERE id = $1
        "#,
    )
    .bind(mention_id)
    .bind(label.as_str())
    .bind(score)
    .bind(analyzed_at)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads for the aggregator and the backfill sweep
// ---------------------------------------------------------------------------

/// A mention still waiting for sentiment analysis.
pub struct UnanalyzedMention {
    pub id: i64,
    pub platform: Platform,
    pub body_text: String,
    pub posted_at: DateTime<Utc>,
}

pub async fn unanalyzed_since(pool: &PgPool, since: NaiveDate) -> Result<Vec<UnanalyzedMention>> {
    let rows = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
        r#"
        SELECT id, platform, body_text, posted_at
        FROM mentions
        WHERE sentiment_analyzed_at IS NULL AND posted_at::date >= $1
        ORDER BY posted_at
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, platform, body_text, posted_at)| {
            Platform::parse(&platform).map(|platform| UnanalyzedMention {
                id,
                platform,
                body_text,
                posted_at,
            })
        })
        .collect())
}

/// (label, score) pairs for one (date, platform) partition. NULL label
/// means the row has not been analyzed.
pub async fn sentiment_rows(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
) -> Result<Vec<(Option<String>, Option<f64>)>> {
    let rows = sqlx::query_as::<_, (Option<String>, Option<f64>)>(
        r#"
        SELECT sentiment_label, sentiment_score
        FROM mentions
        WHERE posted_at::date = $1 AND platform = $2
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mention count and summed engagement for one day's partition.
pub async fn daily_totals(
    pool: &PgPool,
    date: NaiveDate,
    platform: Platform,
) -> Result<(i64, i64)> {
    let (count, engagement) = sqlx::query_as::<_, (i64, Option<i64>)>(
        r#"
        SELECT COUNT(*), SUM(likes::bigint + reshares::bigint + replies::bigint)
        FROM mentions
        WHERE posted_at::date = $1 AND platform = $2
        "#,
    )
    .bind(date)
    .bind(platform.as_str())
    .fetch_one(pool)
    .await?;
    Ok((count, engagement.unwrap_or(0)))
}

/// Same totals over a week partition.
pub async fn weekly_totals(
    pool: &PgPool,
    week_start: NaiveDate,
    platform: Platform,
) -> Result<(i64, i64)> {
    let (count, engagement) = sqlx::query_as::<_, (i64, Option<i64>)>(
        r#"
        SELECT COUNT(*), SUM(likes::bigint + reshares::bigint + replies::bigint)
        FROM mentions
        WHERE week_start_date = $1 AND platform = $2
        "#,
    )
    .bind(week_start)
    .bind(platform.as_str())
    .fetch_one(pool)
    .await?;
    Ok((count, engagement.unwrap_or(0)))
}
