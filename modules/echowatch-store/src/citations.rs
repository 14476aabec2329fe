use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use echowatch_common::{CitationType, CitationWork};

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Upsert one work. On conflict only the citation count and timestamp
/// move; title, authors and classification stay as first recorded.
pub async fn upsert_work(pool: &PgPool, work: &CitationWork) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO citation_works
            (work_id, doi, title, authors, publication_date, cited_by_count,
             source_url, is_dead, citation_type, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (work_id) DO UPDATE
            SET cited_by_count = EXCLUDED.cited_by_count,
                updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&work.work_id)
    .bind(&work.doi)
    .bind(&work.title)
    .bind(&work.authors)
    .bind(work.publication_date)
    .bind(work.cited_by_count)
    .bind(&work.source_url)
    .bind(work.is_dead)
    .bind(work.citation_type.as_str())
    .bind(work.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a work dead (broken link or duplicate loser). Dead works stay
/// in the table but drop out of the totals.
pub async fn mark_dead(pool: &PgPool, work_id: &str) -> Result<()> {
    sqlx::query("UPDATE citation_works SET is_dead = TRUE, updated_at = now() WHERE work_id = $1")
        .bind(work_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upsert_citation_metrics(
    pool: &PgPool,
    week_start: NaiveDate,
    total_citations: i64,
    new_citations: i64,
    total_works: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO citation_metrics
            (week_start_date, total_citations, new_citations_this_week, total_works)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (week_start_date) DO UPDATE
            SET total_citations = EXCLUDED.total_citations,
                new_citations_this_week = EXCLUDED.new_citations_this_week,
                total_works = EXCLUDED.total_works
        "#,
    )
    .bind(week_start)
    .bind(total_citations)
    .bind(new_citations)
    .bind(total_works)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Summed citation count and work count over live organization works.
pub async fn live_totals(pool: &PgPool) -> Result<(i64, i64)> {
    let (citations, works) = sqlx::query_as::<_, (Option<i64>, i64)>(
        r#"
        SELECT SUM(cited_by_count::bigint), COUNT(*)
        FROM citation_works
        WHERE is_dead = FALSE AND citation_type = $1
        "#,
    )
    .bind(CitationType::Organization.as_str())
    .fetch_one(pool)
    .await?;
    Ok((citations.unwrap_or(0), works))
}

/// Most recent recorded total strictly before the given week. None on
/// the first ever run.
pub async fn previous_total(pool: &PgPool, week_start: NaiveDate) -> Result<Option<i64>> {
    let row = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT total_citations
        FROM citation_metrics
        WHERE week_start_date < $1
        ORDER BY week_start_date DESC
        LIMIT 1
        "#,
    )
    .bind(week_start)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(t,)| t))
}

/// All live works, for duplicate resolution and the liveness sweep.
pub async fn live_works(pool: &PgPool) -> Result<Vec<CitationWork>> {
    let rows = sqlx::query_as::<
        _,
        (
            String,
            Option<String>,
            String,
            String,
            Option<NaiveDate>,
            i32,
            String,
            bool,
            String,
            DateTime<Utc>,
        ),
    >(
        r#"
        SELECT work_id, doi, title, authors, publication_date, cited_by_count,
               source_url, is_dead, citation_type, updated_at
        FROM citation_works
        WHERE is_dead = FALSE
        ORDER BY work_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(work_id, doi, title, authors, publication_date, cited_by_count, source_url, is_dead, citation_type, updated_at)| {
                CitationWork {
                    work_id,
                    doi,
                    title,
                    authors,
                    publication_date,
                    cited_by_count,
                    source_url,
                    is_dead,
                    citation_type: CitationType::parse(&citation_type)
                        .unwrap_or(CitationType::WordUsage),
                    updated_at,
                }
            },
        )
        .collect())
}
