//! Streak Reminder server
//!
//! Serves the webhook endpoint and runs the daily reminder job in the background.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use streak_reminder::config::{Config, REMINDER_TEXT};
use streak_reminder::fanout::FanoutJob;
use streak_reminder::notifier::{GraphNotifier, Notifier};
use streak_reminder::registry::{RecipientRegistry, SharedRegistry};
use streak_reminder::schedule::{self, DailySchedule};
use streak_reminder::webhook::{self, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Streak Reminder - Messenger webhook relay
#[derive(Parser)]
#[command(name = "streak-reminder")]
#[command(about = "Serve the Messenger webhook and push a daily streak reminder")]
struct Cli {
    /// Address to listen on (overrides BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Registry JSON file (overrides REGISTRY_FILE)
    #[arg(long)]
    registry_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(path) = cli.registry_file {
        config.registry_file = path;
    }

    info!("Streak reminder starting");

    let store = RecipientRegistry::new(&config);
    info!(
        "Registry {} has {} recipients",
        store.path().display(),
        store.load().len()
    );
    let registry = SharedRegistry::new(store);

    if let Some(owner) = &config.owner_recipient_id {
        match registry.add(owner).await {
            Ok(true) => info!("Registered owner {}", owner),
            Ok(false) => {}
            Err(e) => warn!("Failed to register owner {}: {}", owner, e),
        }
    }

    let notifier: Arc<dyn Notifier> = Arc::new(GraphNotifier::new(&config));

    let job = FanoutJob::new(
        registry.clone(),
        Arc::clone(&notifier),
        REMINDER_TEXT,
        config.schedule_offset,
    );
    let scheduler = schedule::spawn(DailySchedule::from_config(&config)?, job);

    let app = webhook::router(AppState::new(&config.verify_token, registry, notifier));

    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    info!("Streak reminder stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
