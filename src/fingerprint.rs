//! Topic fingerprinting: a similarity key per entry, used to suppress
//! near-duplicate stories across feeds. Primary path digests a semantic
//! embedding of the entry text; any embedding failure drops to a lexical
//! key derived from the title. The fallback never fails, so neither does
//! `topic_key`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::ingest::types::{FeedEntry, TopicEmbedder};

const EMBED_MODEL: &str = "text-embedding-3-small";
/// Chars of entry text sent to the embedding endpoint (cost/latency cap).
const EMBED_INPUT_MAX: usize = 1000;
/// Leading embedding dimensions folded into the digest.
const DIGEST_DIMS: usize = 64;
/// Chars of title kept by the lexical fallback key.
pub const LEXICAL_KEY_MAX: usize = 64;

/// Compute the topic key for an entry. Total: embedding errors are counted
/// and absorbed by the lexical fallback.
pub async fn topic_key(embedder: &dyn TopicEmbedder, entry: &FeedEntry) -> String {
    let content: String = format!("{}\n{}", entry.title, entry.summary)
        .chars()
        .take(EMBED_INPUT_MAX)
        .collect();
    match embedder.embed(&content).await {
        Ok(embedding) => digest_key(&embedding),
        Err(e) => {
            tracing::debug!(error = ?e, "embedding failed, using lexical key");
            counter!("fingerprint_fallback_total").increment(1);
            lexical_key(&entry.title)
        }
    }
}

/// Hash-stable key over the leading embedding dimensions.
pub fn digest_key(embedding: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for v in embedding.iter().take(DIGEST_DIMS) {
        hasher.update(v.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Fallback key: lowercased, length-bounded title prefix. Entries whose
/// titles agree up to the bound collide on purpose; that precision loss is
/// the accepted price of staying total under embedding failure.
pub fn lexical_key(title: &str) -> String {
    title.to_lowercase().chars().take(LEXICAL_KEY_MAX).collect()
}

/// OpenAI embeddings client. Requires `OPENAI_API_KEY`; without it every
/// call errors and the lexical fallback carries the dedup.
pub struct OpenAiEmbeddings {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: EMBED_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl TopicEmbedder for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("OPENAI_API_KEY not set"));
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Item>,
        }
        #[derive(Deserialize)]
        struct Item {
            embedding: Vec<f32>,
        }

        let resp = self
            .http
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&Req {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .context("embeddings request")?
            .error_for_status()
            .context("embeddings non-2xx")?;

        let body: Resp = resp.json().await.context("embeddings body")?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("embeddings response had no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEmbedder;

    #[async_trait]
    impl TopicEmbedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("quota exceeded"))
        }
    }

    fn entry(title: &str) -> FeedEntry {
        FeedEntry {
            id: None,
            link: None,
            title: title.to_string(),
            summary: String::new(),
            published_at: None,
        }
    }

    #[test]
    fn lexical_key_is_case_insensitive_and_bounded() {
        assert_eq!(lexical_key("Big Fire Downtown"), "big fire downtown");
        let long = "x".repeat(200);
        assert_eq!(lexical_key(&long).chars().count(), LEXICAL_KEY_MAX);
    }

    #[test]
    fn digest_key_is_stable_and_discriminating() {
        let a = vec![0.1f32, 0.2, 0.3];
        let b = vec![0.1f32, 0.2, 0.3];
        let c = vec![0.1f32, 0.2, 0.4];
        assert_eq!(digest_key(&a), digest_key(&b));
        assert_ne!(digest_key(&a), digest_key(&c));
    }

    #[test]
    fn digest_key_ignores_dimensions_past_the_cap() {
        let mut a = vec![0.5f32; DIGEST_DIMS];
        let mut b = a.clone();
        a.push(1.0);
        b.push(-1.0);
        assert_eq!(digest_key(&a), digest_key(&b));
    }

    #[tokio::test]
    async fn failing_embedder_collides_equal_titles_only() {
        let em = FailingEmbedder;
        let k1 = topic_key(&em, &entry("Storm warning issued")).await;
        let k2 = topic_key(&em, &entry("STORM Warning Issued")).await;
        let k3 = topic_key(&em, &entry("Completely different story")).await;
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[tokio::test]
    async fn fallback_titles_differing_past_the_bound_collide() {
        let em = FailingEmbedder;
        let base = "y".repeat(LEXICAL_KEY_MAX);
        let k1 = topic_key(&em, &entry(&format!("{base} alpha"))).await;
        let k2 = topic_key(&em, &entry(&format!("{base} omega"))).await;
        assert_eq!(k1, k2); // identical within the bound
    }
}
