//! Talkbridge - chat bridge for EverQuest emulator servers
//!
//! Relays lines between a game server console, a tailed client log and
//! Discord, driven by configurable trigger routes.

mod bridge;
mod common;
mod config;
mod parsers;
mod presence;
mod routing;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bridge::{run_raid_results, run_reconnect_loop, run_status_loop, ChannelBundle, ConsoleIngest, Hub};
use common::TransportId;
use config::{get_config_path, load_and_validate};
use parsers::{compile_start_markers, RaidCollector};
use presence::PresenceStore;
use routing::Template;
use transport::{ConsoleTransport, DiscordTransport, EqLogTransport, TransportRegistry};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = get_config_path();
    let config = load_and_validate(&config_path).map_err(|e| {
        // Logging is not up yet; the config decides its level.
        eprintln!("Failed to load configuration from {}: {}", config_path, e);
        e
    })?;

    let level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Talkbridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);
    for id in TransportId::ALL {
        info!("  {}: {}", id, if config.is_enabled(id) { "enabled" } else { "disabled" });
    }

    // ============================================================
    // Shared state and channels
    // ============================================================
    let channels = ChannelBundle::new();
    let shutdown_rx = channels.control.shutdown_rx.clone();
    let store = Arc::new(PresenceStore::new());
    let (raid_tx, raid_rx) = mpsc::unbounded_channel();

    // ============================================================
    // Transports
    // ============================================================
    let mut transports = TransportRegistry::new();

    if config.discord.enabled {
        transports.register(Arc::new(DiscordTransport::new(
            config.discord.clone(),
            channels.hub.clone(),
            store.clone(),
            shutdown_rx.clone(),
        )));
    }

    if config.telnet.enabled {
        let mut ingest = ConsoleIngest::new(TransportId::Telnet, store.clone(), channels.hub.clone());
        if config.raid.enabled {
            let markers = compile_start_markers(config.raid.start_markers.as_deref())?;
            ingest = ingest.with_raid(RaidCollector::new(markers, raid_tx));
        }
        let notifications = &config.telnet.player_notifications;
        if notifications.enabled && config.discord.enabled {
            ingest = ingest.with_player_notifications(notifications.channel_id.clone());
        }
        transports.register(Arc::new(ConsoleTransport::new(
            config.telnet.clone(),
            ingest,
            store.clone(),
            shutdown_rx.clone(),
        )));
    } else if config.raid.enabled {
        warn!("Raid sync is enabled but the console transport is not; no dumps will be seen");
    }

    if config.eqlog.enabled {
        transports.register(Arc::new(EqLogTransport::new(
            &config.eqlog,
            channels.hub.clone(),
            shutdown_rx.clone(),
        )));
    }

    if transports.is_empty() {
        anyhow::bail!("No transports are enabled, nothing to bridge");
    }

    let hub = Hub::new(&config, transports.clone())?;

    // ============================================================
    // Background tasks
    // ============================================================
    let mut tasks = vec![tokio::spawn(hub.run(channels.hub_rx, shutdown_rx.clone()))];

    if config.raid.enabled {
        tasks.push(tokio::spawn(run_raid_results(
            config.raid.clone(),
            raid_rx,
            channels.hub.clone(),
            shutdown_rx.clone(),
        )));
    }

    if config.keep_alive {
        let retry = config.keep_alive_retry();
        info!("Reconnect supervisor running every {}s", retry.as_secs());
        tasks.push(tokio::spawn(run_reconnect_loop(
            transports.clone(),
            retry,
            shutdown_rx.clone(),
        )));
    } else {
        info!("Keep-alive disabled, dropped transports stay down until restart");
    }

    if config.discord.enabled && !config.discord.bot_status.trim().is_empty() {
        let template = Template::parse(&config.discord.bot_status)?;
        tasks.push(tokio::spawn(run_status_loop(
            transports.clone(),
            template,
            shutdown_rx.clone(),
        )));
    }

    // ============================================================
    // Initial connects
    // ============================================================
    for transport in transports.iter() {
        match transport.connect().await {
            Ok(()) => info!(transport = %transport.id(), "Connected"),
            Err(e) => error!(transport = %transport.id(), "Initial connect failed: {}", e),
        }
    }

    // ============================================================
    // Run until shutdown
    // ============================================================
    shutdown_signal().await;
    info!("Shutdown signal received - stopping...");

    if let Err(e) = channels.control.shutdown_tx.send(true) {
        debug!("Shutdown channel closed: {}", e);
    }

    for transport in transports.iter() {
        match tokio::time::timeout(SHUTDOWN_GRACE, transport.disconnect()).await {
            Ok(Ok(())) => debug!(transport = %transport.id(), "Disconnected"),
            Ok(Err(e)) => warn!(transport = %transport.id(), "Disconnect failed: {}", e),
            Err(_) => warn!(transport = %transport.id(), "Disconnect timed out"),
        }
    }

    for task in tasks {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Background task panicked: {}", e),
            Err(_) => warn!("Background task did not stop in time"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
