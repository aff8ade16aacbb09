// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "CITYBOT_CONFIG_PATH";

/// Digest size when a channel does not set its own.
pub const DEFAULT_LIMIT: usize = 7;

/// Channel table keyed by channel key (e.g. `new_york`). BTreeMap keeps
/// scheduling iteration deterministic.
pub type ChannelMap = BTreeMap<String, ChannelConfig>;

/// One aggregation target: a city with its own feeds, timezone and language.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub city: String,
    #[serde(default = "default_tz")]
    pub tz: String,
    #[serde(default)]
    pub feeds: Vec<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub limit: Option<usize>,
}

fn default_tz() -> String {
    "UTC".to_string()
}
fn default_lang() -> String {
    "en".to_string()
}

impl ChannelConfig {
    /// Channel timezone; unknown names fall back to UTC.
    pub fn timezone(&self) -> Tz {
        self.tz.parse().unwrap_or_else(|_| {
            tracing::warn!(tz = %self.tz, "unknown timezone, using UTC");
            chrono_tz::UTC
        })
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// Load the channel table from an explicit path. TOML or JSON by extension.
pub fn load_channels_from(path: &Path) -> Result<ChannelMap> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading channels from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_channels(&content, ext.as_str())
}

/// Load the channel table using env var + fallbacks:
/// 1) $CITYBOT_CONFIG_PATH
/// 2) config/channels.toml
/// 3) config/channels.json
pub fn load_channels_default() -> Result<ChannelMap> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_channels_from(&pb);
        } else {
            return Err(anyhow!("CITYBOT_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/channels.toml");
    if toml_p.exists() {
        return load_channels_from(&toml_p);
    }
    let json_p = PathBuf::from("config/channels.json");
    if json_p.exists() {
        return load_channels_from(&json_p);
    }
    Err(anyhow!("no channel config found"))
}

fn parse_channels(s: &str, hint_ext: &str) -> Result<ChannelMap> {
    let try_toml = hint_ext == "toml" || s.contains("[channels");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported channel config format"))
}

fn parse_toml(s: &str) -> Result<ChannelMap> {
    #[derive(Deserialize)]
    struct TomlDoc {
        channels: ChannelMap,
    }
    let doc: TomlDoc = toml::from_str(s)?;
    Ok(doc.channels)
}

fn parse_json(s: &str) -> Result<ChannelMap> {
    let v: ChannelMap = serde_json::from_str(s)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_channels_parse_with_defaults() {
        let toml = r#"
            [channels.new_york]
            city = "New York"
            tz = "America/New_York"
            feeds = ["https://a.example/rss", "https://b.example/rss"]
            lat = 40.71
            lon = -74.0

            [channels.madrid]
            city = "Madrid"
            tz = "Europe/Madrid"
            lang = "es"
        "#;
        let map = parse_toml(toml).unwrap();
        assert_eq!(map.len(), 2);
        let ny = &map["new_york"];
        assert_eq!(ny.feeds.len(), 2);
        assert_eq!(ny.lang(), "en"); // default
        assert_eq!(ny.limit(), DEFAULT_LIMIT);
        assert_eq!(map["madrid"].lang(), "es");
        assert!(map["madrid"].feeds.is_empty());
    }

    #[test]
    fn json_channels_parse() {
        let json = r#"{
            "berlin": {
                "city": "Berlin",
                "tz": "Europe/Berlin",
                "lang": "de",
                "feeds": ["https://c.example/atom"],
                "limit": 5
            }
        }"#;
        let map = parse_json(json).unwrap();
        assert_eq!(map["berlin"].limit(), 5);
        assert_eq!(map["berlin"].timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let cfg = ChannelConfig {
            city: "Nowhere".into(),
            tz: "Mars/Olympus_Mons".into(),
            feeds: vec![],
            lang: "en".into(),
            lat: None,
            lon: None,
            limit: None,
        };
        assert_eq!(cfg.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn format_sniffing_accepts_either() {
        let toml = "[channels.x]\ncity = \"X\"";
        assert!(parse_channels(toml, "toml").is_ok());
        let json = r#"{"x": {"city": "X"}}"#;
        assert!(parse_channels(json, "json").is_ok());
        assert!(parse_channels("nonsense", "cfg").is_err());
    }
}
