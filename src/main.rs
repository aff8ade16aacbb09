//! City News Bot — Binary Entrypoint
//! Loads the channel table, wires the aggregation pipeline and its external
//! clients, and runs the per-city slot scheduler until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use city_news_bot::config;
use city_news_bot::events::EventsClient;
use city_news_bot::fingerprint::OpenAiEmbeddings;
use city_news_bot::ingest::fetch::RssClient;
use city_news_bot::metrics_server;
use city_news_bot::scheduler::{self, BotContext};
use city_news_bot::summarize::OpenAiSummarizer;
use city_news_bot::weather::WeatherClient;
use city_news_bot::{Aggregator, SeenStore, TelegramBot};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Periodic liveness log line, every 15 minutes.
fn spawn_heartbeat() {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(900));
        ticker.tick().await; // first tick is immediate; skip it
        loop {
            ticker.tick().await;
            tracing::info!("bot is still running");
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();
    metrics_server::init();

    let channels = config::load_channels_default().context("loading channel config")?;
    tracing::info!(channels = channels.len(), "city-news-bot starting");

    let aggregator = Aggregator::new(
        Arc::new(RssClient::new()),
        Arc::new(OpenAiEmbeddings::from_env()),
        Arc::new(OpenAiSummarizer::from_env()),
        SeenStore::new_24h(),
    );

    let ctx = Arc::new(BotContext {
        aggregator,
        weather: WeatherClient::from_env(),
        events: EventsClient::from_env(),
        bot: TelegramBot::from_env(),
        channels,
    });

    ctx.bot.send_alert("✅ Bot started successfully.").await;
    spawn_heartbeat();

    let sched = scheduler::spawn_scheduler(Arc::clone(&ctx));

    tokio::select! {
        res = sched => {
            tracing::error!(result = ?res, "scheduler exited");
            ctx.bot.send_alert("❌ Bot scheduler exited unexpectedly.").await;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}
