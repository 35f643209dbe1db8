use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use tokio::sync::Notify;

use event_relay::channels::{TelegramBot, TelegramInbox, UpdateListener};
use event_relay::config::{AppConfig, DEFAULT_CONFIG_PATH};
use event_relay::pipeline::Classifier;
use event_relay::poller::{PollerPorts, Scheduler, SourcePoller, request_shutdown};
use event_relay::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = PathBuf::from(
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let classifier = Arc::new(
        Classifier::from_config(&config.rules).context("compiling keyword rules")?,
    );

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        channels = config.channels.len(),
        cities = classifier.cities.len(),
        categories = classifier.categories.len(),
        interval_secs = config.poll_interval.as_secs(),
        "Event relay starting"
    );
    if config.channels.is_empty() {
        tracing::warn!("No channels configured; nothing will be forwarded");
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );

    // ── Telegram ─────────────────────────────────────────────────────────
    let bot = Arc::new(TelegramBot::new(config.bot_token, config.api_base.clone()));
    let me = bot.get_me().await.context("verifying bot token")?;
    tracing::info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("-"),
        "Bot identity verified"
    );

    let refresh = Arc::new(Notify::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let revoked = Arc::new(AtomicBool::new(false));

    let listener = UpdateListener::new(
        Arc::clone(&bot),
        db.clone(),
        Arc::clone(&refresh),
        Arc::clone(&revoked),
    );
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.run().await {
            tracing::error!(reason = %e, "Update listener stopped");
        }
    });

    // ── Poller ───────────────────────────────────────────────────────────
    let ports = PollerPorts {
        source: Arc::new(TelegramInbox::new(db.clone(), Arc::clone(&revoked))),
        offsets: db.clone(),
        recipients: db.clone(),
        delivery: bot.clone(),
    };
    let poller = SourcePoller::new(
        classifier,
        config.poller.clone(),
        ports,
        Arc::clone(&shutdown),
    );
    let scheduler = Scheduler::new(
        poller,
        config.channels.clone(),
        config.poll_interval,
        Arc::clone(&refresh),
        Arc::clone(&shutdown),
    )
    .with_revoked_flag(Arc::clone(&revoked));
    let mut scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    // ── Run until Ctrl-C or a fatal error ────────────────────────────────
    let finished = tokio::select! {
        joined = &mut scheduler_handle => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(joined) => joined,
        None => {
            tracing::info!("Shutdown requested");
            request_shutdown(&shutdown, &refresh);
            scheduler_handle.await
        }
    };
    listener_handle.abort();

    match outcome {
        Ok(Ok(())) => {
            tracing::info!("Event relay stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("scheduler stopped"),
        Err(e) => Err(e).context("scheduler task panicked"),
    }
}
