use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Connection handle plus schema management. Cloning is cheap; the pool
/// is shared.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema. Every statement is idempotent so this runs
    /// unconditionally at startup.
    pub async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Schema statement failed: {}", first_line(stmt)))?;
        }
        info!("Schema migration complete");
        Ok(())
    }
}

fn first_line(stmt: &str) -> &str {
    stmt.trim().lines().next().unwrap_or("")
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS mentions (
        id BIGSERIAL PRIMARY KEY,
        platform TEXT NOT NULL,
        natural_key TEXT NOT NULL,
        author TEXT NOT NULL,
        body_text TEXT NOT NULL,
        source_url TEXT NOT NULL,
        posted_at TIMESTAMPTZ NOT NULL,
        week_start_date DATE NOT NULL,
        likes INTEGER NOT NULL DEFAULT 0,
        reshares INTEGER NOT NULL DEFAULT 0,
        replies INTEGER NOT NULL DEFAULT 0,
        sentiment_label TEXT,
        sentiment_score DOUBLE PRECISION,
        sentiment_analyzed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (platform, natural_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_mentions_day_platform
        ON mentions ((posted_at::date), platform)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS citation_works (
        work_id TEXT PRIMARY KEY,
        doi TEXT,
        title TEXT NOT NULL,
        authors TEXT NOT NULL,
        publication_date DATE,
        cited_by_count INTEGER NOT NULL DEFAULT 0,
        source_url TEXT NOT NULL,
        is_dead BOOLEAN NOT NULL DEFAULT FALSE,
        citation_type TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS citation_metrics (
        week_start_date DATE PRIMARY KEY,
        total_citations BIGINT NOT NULL,
        new_citations_this_week BIGINT NOT NULL,
        total_works BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS daily_platform_metrics (
        date DATE NOT NULL,
        platform TEXT NOT NULL,
        follower_count INTEGER,
        mentions_count BIGINT NOT NULL DEFAULT 0,
        engagement_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
        UNIQUE (date, platform)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weekly_platform_metrics (
        week_start_date DATE NOT NULL,
        platform TEXT NOT NULL,
        follower_count INTEGER,
        mentions_count BIGINT NOT NULL DEFAULT 0,
        engagement_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
        UNIQUE (week_start_date, platform)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sentiment_metrics (
        date DATE NOT NULL,
        platform TEXT NOT NULL,
        positive_count BIGINT NOT NULL DEFAULT 0,
        negative_count BIGINT NOT NULL DEFAULT 0,
        neutral_count BIGINT NOT NULL DEFAULT 0,
        unanalyzed_count BIGINT NOT NULL DEFAULT 0,
        average_score DOUBLE PRECISION,
        UNIQUE (date, platform)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS site_metrics (
        week_start_date DATE PRIMARY KEY,
        sessions BIGINT NOT NULL DEFAULT 0,
        total_users BIGINT NOT NULL DEFAULT 0,
        new_users BIGINT NOT NULL DEFAULT 0,
        returning_users BIGINT NOT NULL DEFAULT 0,
        pageviews BIGINT NOT NULL DEFAULT 0,
        avg_session_duration DOUBLE PRECISION NOT NULL DEFAULT 0,
        bounce_rate DOUBLE PRECISION NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS top_pages (
        week_start_date DATE NOT NULL,
        page_path TEXT NOT NULL,
        pageviews BIGINT NOT NULL DEFAULT 0,
        avg_time_on_page DOUBLE PRECISION NOT NULL DEFAULT 0,
        UNIQUE (week_start_date, page_path)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS geo_metrics (
        week_start_date DATE NOT NULL,
        country TEXT NOT NULL,
        sessions BIGINT NOT NULL DEFAULT 0,
        users BIGINT NOT NULL DEFAULT 0,
        UNIQUE (week_start_date, country)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weekly_snapshots (
        week_start_date DATE PRIMARY KEY,
        week_end_date DATE NOT NULL,
        total_news_mentions BIGINT NOT NULL DEFAULT 0,
        total_social_mentions BIGINT NOT NULL DEFAULT 0,
        total_citations BIGINT NOT NULL DEFAULT 0,
        total_sessions BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS discovered_sources (
        name TEXT PRIMARY KEY,
        discovered_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_checked TIMESTAMPTZ
    )
    "#,
];
