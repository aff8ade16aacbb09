//! # Rolling Dedup Store
//! Per-channel sliding windows of seen entry identities and topic keys
//! (default 24h). Suppression is purely age-based: a record blocks matching
//! entries until it falls out of the window, never by count.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

/// Thread-safe rolling windows of seen identities/topics, keyed by channel.
#[derive(Debug)]
pub struct SeenStore {
    inner: Mutex<HashMap<String, ChannelSeen>>,
    window: Duration,
}

/// Stored records as `(first_seen_unix, value)`, append order = time order.
#[derive(Debug, Default)]
struct ChannelSeen {
    ids: VecDeque<(u64, String)>,
    topics: VecDeque<(u64, String)>,
}

impl SeenStore {
    /// Create a store with the given retention window.
    pub fn with_window(window: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Convenience constructor for the 24h window.
    pub fn new_24h() -> Self {
        Self::with_window(Duration::from_secs(24 * 3600))
    }

    /// Drop every record that has reached the window age. Must run before
    /// membership checks in an aggregation pass; records inserted at `t` are
    /// gone for any `now >= t + window`.
    pub fn prune(&self, channel: &str, now: u64) {
        let cutoff = now.saturating_sub(self.window.as_secs());
        let mut inner = self.inner.lock().expect("seen store mutex poisoned");
        if let Some(seen) = inner.get_mut(channel) {
            expire(&mut seen.ids, cutoff);
            expire(&mut seen.topics, cutoff);
        }
    }

    pub fn seen_id(&self, channel: &str, id: &str) -> bool {
        let inner = self.inner.lock().expect("seen store mutex poisoned");
        inner
            .get(channel)
            .is_some_and(|s| s.ids.iter().any(|(_, v)| v == id))
    }

    pub fn seen_topic(&self, channel: &str, key: &str) -> bool {
        let inner = self.inner.lock().expect("seen store mutex poisoned");
        inner
            .get(channel)
            .is_some_and(|s| s.topics.iter().any(|(_, v)| v == key))
    }

    pub fn record_id(&self, channel: &str, now: u64, id: &str) {
        let mut inner = self.inner.lock().expect("seen store mutex poisoned");
        inner
            .entry(channel.to_string())
            .or_default()
            .ids
            .push_back((now, id.to_string()));
    }

    pub fn record_topic(&self, channel: &str, now: u64, key: &str) {
        let mut inner = self.inner.lock().expect("seen store mutex poisoned");
        inner
            .entry(channel.to_string())
            .or_default()
            .topics
            .push_back((now, key.to_string()));
    }

    /// Length of the retention window in seconds (diagnostics/telemetry).
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

fn expire(buf: &mut VecDeque<(u64, String)>, cutoff: u64) {
    // Records arrive in time order, so the expired ones sit at the front.
    while let Some(&(t, _)) = buf.front() {
        if t <= cutoff {
            buf.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 24 * 3600;

    #[test]
    fn record_then_seen() {
        let store = SeenStore::new_24h();
        let now = 1_000_000;
        assert!(!store.seen_id("madrid", "a"));
        store.record_id("madrid", now, "a");
        store.record_topic("madrid", now, "t1");
        assert!(store.seen_id("madrid", "a"));
        assert!(store.seen_topic("madrid", "t1"));
        assert!(!store.seen_topic("madrid", "t2"));
    }

    #[test]
    fn records_expire_at_exactly_window_age() {
        let store = SeenStore::new_24h();
        let t = 1_000_000;
        store.record_id("nyc", t, "a");
        store.record_topic("nyc", t, "k");

        // One second before expiry: still present.
        store.prune("nyc", t + DAY - 1);
        assert!(store.seen_id("nyc", "a"));
        assert!(store.seen_topic("nyc", "k"));

        // At exactly window age: gone.
        store.prune("nyc", t + DAY);
        assert!(!store.seen_id("nyc", "a"));
        assert!(!store.seen_topic("nyc", "k"));
    }

    #[test]
    fn prune_keeps_younger_records() {
        let store = SeenStore::new_24h();
        store.record_id("nyc", 1_000, "old");
        store.record_id("nyc", 90_000, "young");
        store.prune("nyc", 1_000 + DAY);
        assert!(!store.seen_id("nyc", "old"));
        assert!(store.seen_id("nyc", "young"));
    }

    #[test]
    fn channels_are_isolated() {
        let store = SeenStore::new_24h();
        store.record_id("madrid", 500, "same");
        store.record_topic("madrid", 500, "same-topic");
        assert!(!store.seen_id("berlin", "same"));
        assert!(!store.seen_topic("berlin", "same-topic"));
    }

    #[test]
    fn custom_window_is_respected() {
        let store = SeenStore::with_window(Duration::from_secs(60));
        store.record_topic("c", 100, "k");
        store.prune("c", 159);
        assert!(store.seen_topic("c", "k"));
        store.prune("c", 160);
        assert!(!store.seen_topic("c", "k"));
    }
}
