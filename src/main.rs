mod addressing;
mod bot;
mod classify;
mod commands;
mod config;
mod dispatch;
mod idiom;
mod llm;
mod platform;
mod providers;
mod router;
mod scheduler;
mod session;
mod speech;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Robot;
use crate::config::Config;
use crate::platform::wcf_http::{self, WcfHttpClient};
use crate::platform::Transport;
use crate::providers::MediaStore;
use crate::scheduler::{cleanup, reports, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wxrobot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Gateway: {}", config.bridge.base_url);
    info!("  Groups: {:?}", config.routing.groups);
    info!("  Media: {}", config.storage.media_dir.display());
    info!("  Session scope: {:?}", config.session.scope);

    let gateway = Arc::new(WcfHttpClient::new(&config.bridge)?);
    let self_wxid = match &config.bridge.self_wxid {
        Some(wxid) => wxid.clone(),
        None => gateway
            .self_wxid()
            .await
            .context("Failed to query the bot's own wxid from the gateway")?,
    };
    info!("Logged in as {}", self_wxid);

    let robot = Arc::new(Robot::new(&config, gateway)?);
    robot.refresh_contacts().await;

    let mut scheduler = Scheduler::new().await?;
    reports::register(&scheduler, robot.clone()).await?;
    cleanup::register(
        &scheduler,
        MediaStore::new(config.storage.media_dir.clone()),
        &config.storage,
    )
    .await?;
    scheduler.start().await?;

    let (tx, rx) = mpsc::channel(config.bridge.queue_capacity);
    let worker = tokio::spawn(robot.clone().run(rx));

    info!("Bot is starting...");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down");
    };
    wcf_http::serve(&config.bridge.listen, tx, &self_wxid, shutdown).await?;

    scheduler.shutdown().await?;
    // The server dropped the last sender, so the worker drains the queue and exits
    worker.await.context("Message worker panicked")?;

    Ok(())
}
