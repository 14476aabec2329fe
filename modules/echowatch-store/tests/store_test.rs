//! Integration tests against a live Postgres. Run with:
//!
//!   DATABASE_URL=postgres://... cargo test -p echowatch-store -- --ignored

use chrono::{NaiveDate, Utc};

use echowatch_common::{CitationType, CitationWork, NewMention, Platform, WriteOutcome};
use echowatch_store::{citations, mentions, sources, Store};

async fn test_store() -> Store {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for store tests");
    let store = Store::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

fn sample_mention(key: &str) -> NewMention {
    NewMention {
        platform: Platform::Microblog,
        natural_key: key.to_string(),
        author: "someone".to_string(),
        body_text: "An ordinary mention".to_string(),
        source_url: "https://example.org/status/1".to_string(),
        posted_at: Utc::now(),
        week_start_date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
        likes: 3,
        reshares: 1,
        replies: 0,
        sentiment_label: None,
        sentiment_score: None,
        sentiment_analyzed_at: None,
    }
}

#[tokio::test]
#[ignore]
async fn inserting_the_same_natural_key_twice_is_a_duplicate() {
    let store = test_store().await;
    let key = format!("test-dup-{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
    let mention = sample_mention(&key);

    let first = mentions::insert_mention(store.pool(), &mention).await.unwrap();
    assert_eq!(first, WriteOutcome::Inserted);

    // Second sighting with different engagement must not touch the row.
    let mut again = sample_mention(&key);
    again.likes = 999;
    let second = mentions::insert_mention(store.pool(), &again).await.unwrap();
    assert_eq!(second, WriteOutcome::Duplicate);

    let (count, engagement) =
        mentions::weekly_totals(store.pool(), mention.week_start_date, Platform::Microblog)
            .await
            .unwrap();
    assert!(count >= 1);
    // The original engagement snapshot survives, not the 999.
    assert!(engagement < 999);
}

#[tokio::test]
#[ignore]
async fn citation_upsert_moves_only_count_and_timestamp() {
    let store = test_store().await;
    let work_id = format!("W-test-{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
    let work = CitationWork {
        work_id: work_id.clone(),
        doi: Some("10.1234/example".to_string()),
        title: "Original title".to_string(),
        authors: "A. Author".to_string(),
        publication_date: NaiveDate::from_ymd_opt(2025, 3, 1),
        cited_by_count: 4,
        source_url: "https://example.org/w1".to_string(),
        is_dead: false,
        citation_type: CitationType::Organization,
        updated_at: Utc::now(),
    };
    citations::upsert_work(store.pool(), &work).await.unwrap();

    let mut revised = work.clone();
    revised.title = "Mutated title".to_string();
    revised.cited_by_count = 9;
    citations::upsert_work(store.pool(), &revised).await.unwrap();

    let stored = citations::live_works(store.pool())
        .await
        .unwrap()
        .into_iter()
        .find(|w| w.work_id == work_id)
        .expect("work present");
    assert_eq!(stored.title, "Original title");
    assert_eq!(stored.cited_by_count, 9);
}

#[tokio::test]
#[ignore]
async fn discovered_source_is_recorded_once() {
    let store = test_store().await;
    let name = format!("testsub{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));

    let first = sources::insert_discovered(store.pool(), &name).await.unwrap();
    let second = sources::insert_discovered(store.pool(), &name).await.unwrap();
    assert_eq!(first, WriteOutcome::Inserted);
    assert_eq!(second, WriteOutcome::Duplicate);

    let active = sources::active_names(store.pool()).await.unwrap();
    assert!(active.contains(&name));

    sources::deactivate(store.pool(), &name).await.unwrap();
    let active = sources::active_names(store.pool()).await.unwrap();
    assert!(!active.contains(&name));
}

#[tokio::test]
#[ignore]
async fn touching_a_source_records_the_check_time() {
    let store = test_store().await;
    let name = format!("testsub{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
    sources::insert_discovered(store.pool(), &name).await.unwrap();

    async fn last_checked(pool: &sqlx::PgPool, name: &str) -> Option<chrono::DateTime<Utc>> {
        sqlx::query_as::<_, (Option<chrono::DateTime<Utc>>,)>(
            "SELECT last_checked FROM discovered_sources WHERE name = $1",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
        .0
    }

    assert!(last_checked(store.pool(), &name).await.is_none());
    sources::touch(store.pool(), &name).await.unwrap();
    assert!(last_checked(store.pool(), &name).await.is_some());
}
