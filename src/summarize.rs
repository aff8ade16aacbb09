// src/summarize.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::types::{FeedEntry, Summarizer};
use crate::shorten::Shortener;

const CHAT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions summarizer: one emoji-prefixed headline line per entry,
/// link shortened and appended. Total by contract — API failures degrade to
/// the raw title instead of erroring.
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    shortener: Shortener,
}

impl OpenAiSummarizer {
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
            model: CHAT_MODEL.to_string(),
            shortener: Shortener::from_env(),
        }
    }

    async fn headline(&self, title: &str, lang: &str) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let prompt = format!(
            "Summarise the headline '{title}' in <=15 words, keep language {lang}, \
             add one emoji prefix."
        );
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.3,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim())
            .unwrap_or("");
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, entry: &FeedEntry, lang: &str) -> String {
        let summary = match self.headline(&entry.title, lang).await {
            Some(s) => s,
            None => {
                tracing::warn!(title = %entry.title, "summary call failed, using title");
                entry.title.clone()
            }
        };
        let link = match entry.link.as_deref() {
            Some(l) if !l.is_empty() => self.shortener.shorten(l).await,
            _ => return summary,
        };
        digest_line(&summary, &link)
    }
}

/// Final digest line: summary plus the (possibly shortened) permalink.
pub fn digest_line(summary: &str, link: &str) -> String {
    format!("{summary} → {link}")
}
