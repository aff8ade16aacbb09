// src/ingest/mod.rs
pub mod dedup;
pub mod fetch;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;

use crate::config::ChannelConfig;
use crate::fingerprint;
use crate::ingest::dedup::SeenStore;
use crate::ingest::types::{FeedEntry, FeedFetcher, Summarizer, TopicEmbedder};

/// Recency and dedup-retention horizon.
pub const WINDOW_HOURS: i64 = 24;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from feeds.");
        describe_counter!("ingest_recent_total", "Entries inside the 24h window.");
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_counter!(
            "ingest_dedup_id_total",
            "Entries dropped as identity duplicates."
        );
        describe_counter!(
            "ingest_dedup_topic_total",
            "Entries dropped as topic duplicates."
        );
        describe_counter!("ingest_kept_total", "Entries accepted into a digest.");
        describe_counter!(
            "fingerprint_fallback_total",
            "Topic keys derived via the lexical fallback."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts of the last aggregation.");
    });
}

/// Normalize text: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Whether the entry's publish time falls within the trailing window,
/// evaluated in the channel's timezone. Undated entries are never recent.
/// The boundary is inclusive: exactly `horizon_hours` old still counts.
pub fn is_recent(published_at: Option<u64>, tz: Tz, horizon_hours: i64) -> bool {
    let Some(ts) = published_at else {
        return false;
    };
    let Some(published) = chrono::DateTime::from_timestamp(ts as i64, 0) else {
        return false;
    };
    let published = published.with_timezone(&tz);
    let now = Utc::now().with_timezone(&tz);
    now.signed_duration_since(published) <= chrono::Duration::hours(horizon_hours)
}

/// The per-channel aggregation pipeline: concurrent feed fetch, recency
/// filter, identity + topic dedup against the rolling store, bounded output,
/// summarization.
pub struct Aggregator {
    fetcher: Arc<dyn FeedFetcher>,
    embedder: Arc<dyn TopicEmbedder>,
    summarizer: Arc<dyn Summarizer>,
    seen: SeenStore,
}

impl Aggregator {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        embedder: Arc<dyn TopicEmbedder>,
        summarizer: Arc<dyn Summarizer>,
        seen: SeenStore,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            summarizer,
            seen,
        }
    }

    /// Produce up to `limit` summary lines of fresh news for one channel.
    ///
    /// Feeds fail independently: a dead feed contributes nothing and the
    /// call itself never errors. All feeds failing yields an empty digest.
    pub async fn latest_items(
        &self,
        channel_key: &str,
        cfg: &ChannelConfig,
        limit: usize,
    ) -> Vec<String> {
        ensure_metrics_described();

        let tz = cfg.timezone();
        let now = Utc::now().timestamp().max(0) as u64;

        // Expire old dedup records before any membership check.
        self.seen.prune(channel_key, now);

        let pool = self.fetch_recent(cfg, tz).await;
        let fresh = self.dedup_pass(channel_key, now, pool, limit).await;

        counter!("ingest_kept_total").increment(fresh.len() as u64);
        gauge!("ingest_last_run_ts").set(now as f64);

        let mut lines = Vec::with_capacity(fresh.len());
        for entry in &fresh {
            lines.push(self.summarizer.summarize(entry, cfg.lang()).await);
        }
        lines
    }

    /// Fan out all feed fetches, fan in the recency-filtered union. The pool
    /// is only returned once every fetch has completed or failed, so callers
    /// see a deterministic set regardless of completion order.
    async fn fetch_recent(&self, cfg: &ChannelConfig, tz: Tz) -> Vec<FeedEntry> {
        let mut tasks = JoinSet::new();
        for url in &cfg.feeds {
            let fetcher = Arc::clone(&self.fetcher);
            let url = url.clone();
            tasks.spawn(async move {
                let res = fetcher.fetch(&url).await;
                (url, res)
            });
        }

        let mut pool: Vec<FeedEntry> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(entries))) => {
                    let recent = entries
                        .into_iter()
                        .filter(|e| is_recent(e.published_at, tz, WINDOW_HOURS));
                    pool.extend(recent);
                }
                Ok((url, Err(e))) => {
                    tracing::warn!(error = ?e, feed = %url, "feed fetch failed");
                    counter!("ingest_feed_errors_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "feed task panicked");
                    counter!("ingest_feed_errors_total").increment(1);
                }
            }
        }
        counter!("ingest_recent_total").increment(pool.len() as u64);
        pool
    }

    /// Sort newest-first and walk the pool, dropping anything already seen by
    /// identity or topic within the window. Identity and topic are recorded
    /// together, and only for accepted entries.
    async fn dedup_pass(
        &self,
        channel_key: &str,
        now: u64,
        mut pool: Vec<FeedEntry>,
        limit: usize,
    ) -> Vec<FeedEntry> {
        // Undated entries carry 0 and land at the end.
        pool.sort_by(|a, b| {
            b.published_at
                .unwrap_or(0)
                .cmp(&a.published_at.unwrap_or(0))
        });

        let mut fresh: Vec<FeedEntry> = Vec::new();
        for entry in pool {
            if fresh.len() >= limit {
                break;
            }
            let uid = entry.identity().map(str::to_owned);
            // Identity check first: a known id never costs an embedding call.
            if let Some(uid) = uid.as_deref() {
                if self.seen.seen_id(channel_key, uid) {
                    counter!("ingest_dedup_id_total").increment(1);
                    continue;
                }
            }
            let topic = fingerprint::topic_key(self.embedder.as_ref(), &entry).await;
            if self.seen.seen_topic(channel_key, &topic) {
                counter!("ingest_dedup_topic_total").increment(1);
                continue;
            }
            if let Some(uid) = uid.as_deref() {
                self.seen.record_id(channel_key, now, uid);
            }
            self.seen.record_topic(channel_key, now, &topic);
            fresh.push(entry);
        }
        fresh
    }
}
