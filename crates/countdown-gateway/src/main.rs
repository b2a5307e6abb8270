use std::{sync::Arc, time::Duration};

use clap::Parser;
use countdown_core::{config::CountdownConfig, Transport};
use countdown_telegram::{TelegramAdapter, TelegramContext, TelegramTransport};
use countdown_timer::{ControlDispatcher, DisplayAdapter, TimerEngine, TimerRegistry, TimerStore};
use tracing::{info, warn};

/// How long shutdown waits for tick loops to notice the signal.
const LOOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "countdown-gateway", version, about = "Telegram countdown bot")]
struct Args {
    /// Config file. Falls back to COUNTDOWN_CONFIG, then ~/.countdown/countdown.toml.
    #[arg(short, long)]
    config: Option<String>,

    /// Start with no countdowns even if a snapshot exists.
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "countdown_gateway=info,countdown_timer=info,countdown_telegram=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > COUNTDOWN_CONFIG env > ~/.countdown/countdown.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("COUNTDOWN_CONFIG").ok());
    let config = CountdownConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CountdownConfig::default()
    });

    let Some(telegram) = config.telegram.clone() else {
        anyhow::bail!("no [telegram] section configured (set COUNTDOWN_TELEGRAM__BOT_TOKEN)");
    };
    let bot = TelegramAdapter::bot(&telegram)?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let store = TimerStore::open(db_path)?;

    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    let registry = Arc::new(TimerRegistry::new());
    let display = Arc::new(DisplayAdapter::new(
        Arc::clone(&transport),
        Arc::clone(&registry),
        &config.timer,
    ));
    let engine = Arc::new(TimerEngine::new(
        Arc::clone(&registry),
        display,
        config.timer.clone(),
    ));

    // The snapshot is consumed on start so a crash cannot resurrect timers
    // that finished after it was taken.
    if !args.fresh {
        engine.restore(store.load_all()?);
    }
    store.clear()?;

    let dispatcher = Arc::new(ControlDispatcher::new(Arc::clone(&engine)));
    let ctx = Arc::new(TelegramContext::new(dispatcher, transport));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let telegram_task = tokio::spawn(TelegramAdapter::new(bot, ctx).run(shutdown_rx));
    info!("countdown gateway running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    engine.shutdown();
    let _ = shutdown_tx.send(true);

    let deadline = tokio::time::Instant::now() + LOOP_DRAIN_TIMEOUT;
    while engine.active_loops() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if engine.active_loops() > 0 {
        warn!(active = engine.active_loops(), "tick loops still running at exit");
    }

    let saved = store.save_all(&registry.snapshot())?;
    if let Err(e) = telegram_task.await {
        warn!(error = %e, "Telegram task ended abnormally");
    }
    info!(saved, "countdown gateway stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
