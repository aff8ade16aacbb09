// src/events.rs
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ChannelConfig;

const TM_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const PAGE_SIZE: &str = "7";

/// Ticketmaster Discovery client for the daily "events in town" digest.
pub struct EventsClient {
    key: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TmResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<TmEmbedded>,
}

#[derive(Debug, Deserialize)]
struct TmEmbedded {
    events: Vec<TmEvent>,
}

#[derive(Debug, Deserialize)]
struct TmEvent {
    name: String,
    url: Option<String>,
    dates: Option<TmDates>,
    classifications: Option<Vec<TmClassification>>,
    #[serde(rename = "_embedded")]
    embedded: Option<TmEventEmbedded>,
}

#[derive(Debug, Deserialize)]
struct TmDates {
    start: Option<TmStart>,
}

#[derive(Debug, Deserialize)]
struct TmStart {
    #[serde(rename = "localTime")]
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmClassification {
    segment: Option<TmSegment>,
}

#[derive(Debug, Deserialize)]
struct TmSegment {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmEventEmbedded {
    venues: Vec<TmVenue>,
}

#[derive(Debug, Deserialize)]
struct TmVenue {
    name: Option<String>,
}

impl EventsClient {
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("TICKETMASTER_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        )
    }

    pub fn new(key: Option<String>) -> Self {
        Self {
            key,
            http: reqwest::Client::new(),
        }
    }

    /// Fetch and format today's events for the channel's city. `None` when
    /// unconfigured, on any request failure, or when the city has nothing on.
    pub async fn digest(&self, cfg: &ChannelConfig) -> Option<String> {
        let key = self.key.as_deref()?;
        if cfg.city.is_empty() {
            return None;
        }

        let url = event_url(&cfg.city, key, cfg.timezone());
        let resp: TmResponse = match self
            .http
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(r) => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = ?e, "events body unreadable");
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!(error = ?e, city = %cfg.city, "events request failed");
                return None;
            }
        };

        let events = resp.embedded.map(|e| e.events).unwrap_or_default();
        if events.is_empty() {
            tracing::debug!(city = %cfg.city, "no events found for today");
            return None;
        }
        Some(format_digest(&cfg.city, &events))
    }
}

/// Discovery query from local midnight (in the channel tz) onward.
fn event_url(city: &str, key: &str, tz: Tz) -> reqwest::Url {
    let start = local_midnight_utc_iso(tz);
    reqwest::Url::parse_with_params(
        TM_URL,
        [
            ("city", city),
            ("size", PAGE_SIZE),
            ("sort", "date,asc"),
            ("apikey", key),
            ("startDateTime", start.as_str()),
        ],
    )
    .expect("static ticketmaster url")
}

fn local_midnight_utc_iso(tz: Tz) -> String {
    let midnight = Utc::now().with_timezone(&tz).date_naive();
    let start = tz
        .from_local_datetime(&midnight.and_hms_opt(0, 0, 0).expect("valid midnight"))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn format_digest(city: &str, events: &[TmEvent]) -> String {
    let mut lines = vec![format!("<b>🎟️ Events in {city} Today</b>\n")];
    for ev in events {
        let time = ev
            .dates
            .as_ref()
            .and_then(|d| d.start.as_ref())
            .and_then(|s| s.local_time.as_deref())
            .map(|t| t.chars().take(5).collect::<String>())
            .unwrap_or_default();
        let venue = ev
            .embedded
            .as_ref()
            .and_then(|e| e.venues.first())
            .and_then(|v| v.name.as_deref())
            .unwrap_or("TBA");
        let link = ev.url.as_deref().unwrap_or("");
        let cat = ev
            .classifications
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.segment.as_ref())
            .and_then(|s| s.name.as_deref())
            .unwrap_or("");
        let emoji = category_emoji(cat);
        lines.push(format!(
            "{emoji} {} – {venue}, {time} → <a href=\"{link}\">link</a>",
            ev.name
        ));
    }
    lines.push(format!(
        "\n💬 Know someone in {city}? Forward this post now!"
    ));
    lines.join("\n\n")
}

pub fn category_emoji(category: &str) -> &'static str {
    let cat = category.to_lowercase();
    if cat.contains("music") {
        "🎵"
    } else if cat.contains("arts") {
        "🎭"
    } else if cat.contains("sports") {
        "🏟"
    } else if cat.contains("family") {
        "🎪"
    } else if cat.contains("film") {
        "🎬"
    } else {
        "🎉"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_emoji_covers_known_segments() {
        assert_eq!(category_emoji("Music"), "🎵");
        assert_eq!(category_emoji("Arts & Theatre"), "🎭");
        assert_eq!(category_emoji("Sports"), "🏟");
        assert_eq!(category_emoji("Film"), "🎬");
        assert_eq!(category_emoji(""), "🎉");
    }

    #[test]
    fn event_url_encodes_the_city() {
        let url = event_url("New York", "k123", chrono_tz::America::New_York);
        let s = url.as_str();
        assert!(s.starts_with(TM_URL));
        assert!(s.contains("city=New+York") || s.contains("city=New%20York"));
        assert!(s.contains("apikey=k123"));
        assert!(s.contains("startDateTime="));
    }

    #[test]
    fn digest_formatting_includes_header_and_cta() {
        let events = vec![TmEvent {
            name: "Jazz Night".into(),
            url: Some("https://tm.example/jazz".into()),
            dates: Some(TmDates {
                start: Some(TmStart {
                    local_time: Some("19:30:00".into()),
                }),
            }),
            classifications: Some(vec![TmClassification {
                segment: Some(TmSegment {
                    name: Some("Music".into()),
                }),
            }]),
            embedded: Some(TmEventEmbedded {
                venues: vec![TmVenue {
                    name: Some("Blue Hall".into()),
                }],
            }),
        }];
        let out = format_digest("Madrid", &events);
        assert!(out.starts_with("<b>🎟️ Events in Madrid Today</b>"));
        assert!(out.contains("🎵 Jazz Night – Blue Hall, 19:30"));
        assert!(out.contains("Forward this post now!"));
    }
}
