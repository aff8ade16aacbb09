// tests/pipeline_bounded.rs
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use city_news_bot::config::ChannelConfig;
use city_news_bot::{Aggregator, FeedEntry, FeedFetcher, SeenStore, Summarizer, TopicEmbedder};

struct MapFetcher {
    feeds: HashMap<String, Vec<FeedEntry>>,
}

#[async_trait]
impl FeedFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        Ok(self.feeds.get(url).cloned().unwrap_or_default())
    }
}

struct EchoEmbedder;

#[async_trait]
impl TopicEmbedder for EchoEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += b as f32;
        }
        Ok(v)
    }
}

struct TitleSummarizer;

#[async_trait]
impl Summarizer for TitleSummarizer {
    async fn summarize(&self, entry: &FeedEntry, _lang: &str) -> String {
        entry.title.clone()
    }
}

fn cfg(feeds: &[&str]) -> ChannelConfig {
    ChannelConfig {
        city: "Test City".into(),
        tz: "UTC".into(),
        feeds: feeds.iter().map(|s| s.to_string()).collect(),
        lang: "en".into(),
        lat: None,
        lon: None,
        limit: None,
    }
}

#[tokio::test]
async fn twenty_candidates_truncate_to_the_seven_newest() {
    // Twenty distinct fresh stories, one per 30 minutes, split over two
    // feeds so the fan-in matters.
    let now = Utc::now().timestamp();
    let mk = |i: i64| FeedEntry {
        id: Some(format!("story-{i:02}")),
        link: None,
        title: format!("Headline number {i:02}"),
        summary: format!("Body of story {i:02}."),
        published_at: Some((now - (i + 1) * 1800).max(0) as u64),
    };
    let feeds = HashMap::from([
        (
            "https://a.example/rss".to_string(),
            (0..10).map(mk).collect::<Vec<_>>(),
        ),
        (
            "https://b.example/rss".to_string(),
            (10..20).map(mk).collect::<Vec<_>>(),
        ),
    ]);

    let agg = Aggregator::new(
        Arc::new(MapFetcher { feeds }),
        Arc::new(EchoEmbedder),
        Arc::new(TitleSummarizer),
        SeenStore::new_24h(),
    );
    let out = agg
        .latest_items(
            "testville",
            &cfg(&["https://a.example/rss", "https://b.example/rss"]),
            7,
        )
        .await;

    // Exactly seven, and exactly the seven most recent, newest first.
    let expect: Vec<String> = (0..7).map(|i| format!("Headline number {i:02}")).collect();
    assert_eq!(out, expect);
}

#[tokio::test]
async fn stale_and_undated_entries_never_reach_the_digest() {
    let now = Utc::now().timestamp();
    let fresh = FeedEntry {
        id: Some("fresh".into()),
        link: None,
        title: "Fresh story".into(),
        summary: String::new(),
        published_at: Some((now - 3600).max(0) as u64),
    };
    let stale = FeedEntry {
        id: Some("stale".into()),
        link: None,
        title: "Yesterday's story".into(),
        summary: String::new(),
        published_at: Some((now - 25 * 3600).max(0) as u64),
    };
    let undated = FeedEntry {
        id: Some("undated".into()),
        link: None,
        title: "Undated story".into(),
        summary: String::new(),
        published_at: None,
    };
    let feeds = HashMap::from([(
        "https://a.example/rss".to_string(),
        vec![stale, fresh, undated],
    )]);

    let agg = Aggregator::new(
        Arc::new(MapFetcher { feeds }),
        Arc::new(EchoEmbedder),
        Arc::new(TitleSummarizer),
        SeenStore::new_24h(),
    );
    let out = agg
        .latest_items("testville", &cfg(&["https://a.example/rss"]), 7)
        .await;

    assert_eq!(out, vec!["Fresh story".to_string()]);
}
