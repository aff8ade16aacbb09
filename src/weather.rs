// src/weather.rs
use serde::Deserialize;
use std::time::Duration;

use crate::config::ChannelConfig;

/// Current-conditions extra line for a channel digest. Every failure path
/// yields an empty string; the digest simply ships without weather.
pub struct WeatherClient {
    key: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Owm {
    main: OwmMain,
    weather: Vec<OwmCondition>,
    sys: OwmSys,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    sunrise: i64,
    sunset: i64,
}

impl WeatherClient {
    pub fn from_env() -> Self {
        Self::new(std::env::var("WEATHER_KEY").ok().filter(|k| !k.is_empty()))
    }

    pub fn new(key: Option<String>) -> Self {
        Self {
            key,
            http: reqwest::Client::new(),
        }
    }

    pub async fn extras_line(&self, cfg: &ChannelConfig) -> String {
        let (Some(key), Some(lat), Some(lon)) = (&self.key, cfg.lat, cfg.lon) else {
            return String::new();
        };

        let lang = cfg.lang();
        let (units, sym) = units_for(&cfg.tz, lang);
        let url = format!(
            "https://api.openweathermap.org/data/2.5/weather?\
             lat={lat}&lon={lon}&units={units}&lang={lang}&appid={key}"
        );

        let data: Owm = match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(error = ?e, "weather body unreadable");
                    return String::new();
                }
            },
            Err(e) => {
                tracing::debug!(error = ?e, "weather request failed");
                return String::new();
            }
        };

        render_line(&data, cfg, sym).unwrap_or_default()
    }
}

fn render_line(data: &Owm, cfg: &ChannelConfig, sym: &str) -> Option<String> {
    let tz = cfg.timezone();
    let temp = data.main.temp.round() as i64;
    let descr = capitalize(&data.weather.first()?.description);
    let emoji = emoji_for(&descr);

    let sunrise = clock_time(data.sys.sunrise, tz)?;
    let sunset = clock_time(data.sys.sunset, tz)?;

    Some(format!(
        "------\n{emoji} {temp} {sym}, {descr}\n ☀ {sunrise} • 🌇 {sunset}\n-------"
    ))
}

fn clock_time(unix: i64, tz: chrono_tz::Tz) -> Option<String> {
    let dt = chrono::DateTime::from_timestamp(unix, 0)?;
    Some(dt.with_timezone(&tz).format("%H:%M").to_string())
}

/// Imperial units only for English-language American channels.
pub fn units_for(tz: &str, lang: &str) -> (&'static str, &'static str) {
    if tz.starts_with("America/") && lang == "en" {
        ("imperial", "°F")
    } else {
        ("metric", "°C")
    }
}

/// Keyword match across the configured digest languages (en/es/de/fr);
/// anything unrecognized reads as clouds.
pub fn emoji_for(description: &str) -> &'static str {
    let low = description.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| low.contains(k));
    if has(&["sol", "sun", "sonne", "soleil"]) {
        "☀️"
    } else if has(&["lluvia", "rain", "regen", "pluie"]) {
        "🌧"
    } else if has(&["nieve", "snow", "schnee", "neige"]) {
        "❄️"
    } else {
        "☁️"
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
