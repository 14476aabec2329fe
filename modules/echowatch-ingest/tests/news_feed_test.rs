use chrono::{Datelike, NaiveDate};

use echowatch_common::week::week_start;
use echowatch_common::NewMention;
use echowatch_ingest::connectors::news::alerts_from_feed;

fn load_fixture() -> feed_rs::model::Feed {
    let xml = include_bytes!("fixtures/news_feed.xml");
    feed_rs::parser::parse(&xml[..]).expect("fixture feed parses")
}

#[test]
fn valid_entries_become_alerts_and_linkless_ones_are_skipped() {
    let (alerts, skipped) = alerts_from_feed(load_fixture());

    assert_eq!(alerts.len(), 2);
    assert_eq!(skipped, 1);
}

#[test]
fn markup_is_stripped_from_title_and_snippet() {
    let (alerts, _) = alerts_from_feed(load_fixture());
    let first = &alerts[0];

    assert_eq!(first.title, "Acme Collective opens new community lab");
    assert!(!first.snippet.contains('<'));
    assert!(first.snippet.contains("announced a new lab"));
    // &nbsp; decodes to a plain space.
    assert!(first.snippet.contains("sensor projects this week"));
}

#[test]
fn source_name_falls_back_to_the_link_host() {
    let (alerts, _) = alerts_from_feed(load_fixture());

    assert_eq!(alerts[0].source_name, "news.example.org");
    assert_eq!(alerts[1].source_name, "gazette.example.com");
}

#[test]
fn published_date_anchors_the_week() {
    let (alerts, _) = alerts_from_feed(load_fixture());
    let posted = alerts[0].posted_at.date_naive();

    assert_eq!(posted, NaiveDate::from_ymd_opt(2026, 8, 25).unwrap());
    let monday = week_start(posted);
    assert_eq!(monday.weekday(), chrono::Weekday::Mon);
    assert_eq!(monday, NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
}

#[test]
fn natural_keys_differ_even_for_alerts_sharing_a_host() {
    let (alerts, _) = alerts_from_feed(load_fixture());
    let a = NewMention::news_key(&alerts[0].url, &alerts[0].title);
    let b = NewMention::news_key(&alerts[1].url, &alerts[1].title);
    assert_ne!(a, b);
}
