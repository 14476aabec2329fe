use anyhow::Result;
use sqlx::PgPool;

use echowatch_common::WriteOutcome;

/// Record a newly discovered community. Names are the natural key, so
/// re-discovery across runs is a no-op.
pub async fn insert_discovered(pool: &PgPool, name: &str) -> Result<WriteOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO discovered_sources (name, discovered_at, is_active)
        VALUES ($1, now(), TRUE)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        Ok(WriteOutcome::Inserted)
    } else {
        Ok(WriteOutcome::Duplicate)
    }
}

/// Active community names, merged into the connector set at startup.
pub async fn active_names(pool: &PgPool) -> Result<Vec<String>> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT name FROM discovered_sources WHERE is_active = TRUE ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}

/// Deactivate a community without deleting its history.
pub async fn deactivate(pool: &PgPool, name: &str) -> Result<()> {
    sqlx::query("UPDATE discovered_sources SET is_active = FALSE WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stamp a community as checked, right after its feed is fetched.
pub async fn touch(pool: &PgPool, name: &str) -> Result<()> {
    sqlx::query("UPDATE discovered_sources SET last_checked = now() WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}
