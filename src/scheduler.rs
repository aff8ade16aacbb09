// src/scheduler.rs
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::config::{ChannelConfig, ChannelMap};
use crate::events::EventsClient;
use crate::ingest::Aggregator;
use crate::notify::TelegramBot;
use crate::weather::WeatherClient;

/// Digest posting times, in each channel's own timezone.
pub const DIGEST_SLOTS: &[(u32, u32)] = &[(8, 0), (13, 0), (16, 30), (20, 15)];
/// Daily events digest time.
pub const EVENTS_SLOT: (u32, u32) = (9, 0);

const TICK: Duration = Duration::from_secs(30);

/// Everything a scheduled job needs, wired once at startup.
pub struct BotContext {
    pub aggregator: Aggregator,
    pub weather: WeatherClient,
    pub events: EventsClient,
    pub bot: TelegramBot,
    pub channels: ChannelMap,
}

/// Spawn the slot scheduler: a 30s tick that fires each channel's digest
/// and events jobs at their local times, at most once per slot per local
/// date. Jobs run detached so a slow channel cannot stall the tick loop.
pub fn spawn_scheduler(ctx: Arc<BotContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut fired: FiredMap = HashMap::new();
        let mut ticker = tokio::time::interval(TICK);
        loop {
            ticker.tick().await;
            for (key, cfg) in &ctx.channels {
                let local = Utc::now().with_timezone(&cfg.timezone());
                for &slot in DIGEST_SLOTS {
                    if mark_due(&mut fired, key, slot, &local) {
                        tracing::info!(channel = %key, slot = ?slot, "digest slot due");
                        let ctx = Arc::clone(&ctx);
                        let key = key.clone();
                        let cfg = cfg.clone();
                        tokio::spawn(async move { run_digest_job(&ctx, &key, &cfg).await });
                    }
                }
                if mark_due(&mut fired, key, EVENTS_SLOT, &local) {
                    tracing::info!(channel = %key, "events slot due");
                    let ctx = Arc::clone(&ctx);
                    let key = key.clone();
                    let cfg = cfg.clone();
                    tokio::spawn(async move { run_events_job(&ctx, &key, &cfg).await });
                }
            }
        }
    })
}

/// Aggregate, fetch the weather line, deliver. Failures alert and return.
pub async fn run_digest_job(ctx: &BotContext, channel_key: &str, cfg: &ChannelConfig) {
    let lines = ctx
        .aggregator
        .latest_items(channel_key, cfg, cfg.limit())
        .await;
    let extras = ctx.weather.extras_line(cfg).await;
    if let Err(e) = ctx.bot.send_digest(channel_key, &lines, &extras).await {
        tracing::error!(error = ?e, channel = %channel_key, "digest delivery failed");
        ctx.bot
            .send_alert(&format!("Digest delivery failed for {channel_key}: {e:#}"))
            .await;
    }
}

pub async fn run_events_job(ctx: &BotContext, channel_key: &str, cfg: &ChannelConfig) {
    let Some(digest) = ctx.events.digest(cfg).await else {
        return;
    };
    if let Err(e) = ctx.bot.send_events(channel_key, &digest).await {
        tracing::error!(error = ?e, channel = %channel_key, "events delivery failed");
        ctx.bot
            .send_alert(&format!("Events delivery failed for {channel_key}: {e:#}"))
            .await;
    }
}

type FiredMap = HashMap<(String, u32, u32), NaiveDate>;

/// Whether the slot matches the current local minute.
pub fn slot_matches(local: &DateTime<Tz>, (hour, minute): (u32, u32)) -> bool {
    local.hour() == hour && local.minute() == minute
}

/// True exactly once per channel, slot and local date. The 30s tick lands in
/// the slot minute twice; the fired map absorbs the repeat.
fn mark_due(fired: &mut FiredMap, channel_key: &str, slot: (u32, u32), local: &DateTime<Tz>) -> bool {
    if !slot_matches(local, slot) {
        return false;
    }
    let today = local.date_naive();
    let prev = fired.insert((channel_key.to_string(), slot.0, slot.1), today);
    prev != Some(today)
}
