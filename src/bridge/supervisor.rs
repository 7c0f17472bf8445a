//! Reconnect supervisor and status refresh loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::routing::{Template, TemplateContext};
use crate::transport::TransportRegistry;

/// Interval of the presence/status refresh loop.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Reconnect every registered transport that reports disconnected.
///
/// Returns the number of transports that connected on this sweep.
pub async fn reconnect_sweep(transports: &TransportRegistry) -> usize {
    let mut connected = 0;
    for transport in transports.iter() {
        if transport.is_connected() {
            continue;
        }
        info!(transport = %transport.id(), "Reconnecting...");
        match transport.connect().await {
            Ok(()) => {
                info!(transport = %transport.id(), "Reconnected");
                connected += 1;
            }
            Err(e) => {
                warn!(transport = %transport.id(), "Reconnect failed: {}", e);
            }
        }
    }
    connected
}

/// Run reconnect sweeps every `retry` until shutdown.
///
/// The first tick fires after one full interval; initial connects are the
/// caller's job.
pub async fn run_reconnect_loop(
    transports: TransportRegistry,
    retry: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(retry);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reconnect_sweep(&transports).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    debug!("Reconnect supervisor stopping");
                    break;
                }
            }
        }
    }
}

/// Probe the online count and push the rendered status line.
pub async fn refresh_status(transports: &TransportRegistry, template: &Template) {
    let mut online = None;
    for transport in transports.iter().filter(|t| t.is_connected()) {
        match transport.probe_online().await {
            Some(Ok(count)) => {
                online = Some(count);
                break;
            }
            Some(Err(e)) => warn!(transport = %transport.id(), "Status probe failed: {}", e),
            None => {}
        }
    }
    let Some(online) = online else {
        debug!("No transport answered the status probe");
        return;
    };

    let status = match template.render(&TemplateContext::player_count(online)) {
        Ok(status) => status,
        Err(e) => {
            warn!("Status template failed: {}", e);
            return;
        }
    };
    for transport in transports.iter().filter(|t| t.is_connected()) {
        if let Err(e) = transport.set_status(&status).await {
            warn!(transport = %transport.id(), "Status update failed: {}", e);
        }
    }
}

/// Refresh status every [`STATUS_INTERVAL`] until shutdown.
pub async fn run_status_loop(
    transports: TransportRegistry,
    template: Template,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(STATUS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresh_status(&transports, &template).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    debug!("Status loop stopping");
                    break;
                }
            }
        }
    }
}
