// src/ingest/types.rs
use anyhow::Result;

/// One parsed syndication entry, as it leaves the fetcher.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: Option<String>,   // feed-provided stable id (guid / atom id)
    pub link: Option<String>, // permalink, identity fallback
    pub title: String,
    pub summary: String,           // HTML-stripped snippet
    pub published_at: Option<u64>, // unix seconds; None = undated
}

impl FeedEntry {
    /// Stable identity for dedup: id, else permalink. `None` means the entry
    /// can only be checked by topic fingerprint.
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().or(self.link.as_deref())
    }
}

/// Retrieves and parses one feed URL. Implemented over HTTP in production,
/// by canned fixtures in tests.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

/// Embedding boundary for the topic fingerprint. Any error here triggers the
/// lexical fallback key.
#[async_trait::async_trait]
pub trait TopicEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Summarization boundary. Total by contract: implementations degrade
/// internally instead of returning errors.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, entry: &FeedEntry, lang: &str) -> String;
}
