//! Dispatch hub.
//!
//! Fans inbound events out to destination transports according to the
//! route table built at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::common::error::{ConfigError, TransportError};
use crate::common::{Event, TransportId};
use crate::config::types::Config;
use crate::routing::{compile_routes, CompiledRoute, RouteMatch};
use crate::transport::TransportRegistry;

use super::channels::HubInput;

/// Route table keyed by source transport.
pub type RouteTable = HashMap<TransportId, Vec<Arc<CompiledRoute>>>;

/// The dispatch hub. Owned by a single task; see [`Hub::run`].
pub struct Hub {
    routes: RouteTable,
    transports: TransportRegistry,
    send_timeout: Duration,
}

impl Hub {
    /// Build the hub from configuration.
    ///
    /// Routes whose source or target transport is disabled are dropped here,
    /// so the table is never recomputed per event. A route never delivers
    /// back to its own source.
    pub fn new(config: &Config, transports: TransportRegistry) -> Result<Self, ConfigError> {
        let mut table = RouteTable::new();
        for source in TransportId::ALL {
            if !transports.contains(source) {
                continue;
            }
            for route in compile_routes(config.routes_for(source))? {
                if route.target == source {
                    warn!("Skipping {} route that targets its own source", source);
                    continue;
                }
                if !transports.contains(route.target) {
                    info!(
                        "Skipping {} route to disabled transport {}",
                        source, route.target
                    );
                    continue;
                }
                table.entry(source).or_default().push(Arc::new(route));
            }
        }
        Ok(Self::from_table(table, transports, config.send_timeout()))
    }

    pub fn from_table(
        routes: RouteTable,
        transports: TransportRegistry,
        send_timeout: Duration,
    ) -> Self {
        let count: usize = routes.values().map(Vec::len).sum();
        debug!("Dispatch hub built with {} route(s)", count);
        Self {
            routes,
            transports,
            send_timeout,
        }
    }

    /// Distinct destinations reachable from a source.
    pub fn destinations(&self, source: TransportId) -> Vec<TransportId> {
        let mut targets: Vec<TransportId> = self
            .routes
            .get(&source)
            .map(|routes| routes.iter().map(|r| r.target).collect())
            .unwrap_or_default();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Route an inbound text event. Returns the number of successful sends.
    pub async fn on_event(&self, event: &Event) -> usize {
        let Some(routes) = self.routes.get(&event.source) else {
            debug!("[{}->none] no routes: {}", event.source, event.message);
            return 0;
        };

        let outbound = routes
            .iter()
            .filter_map(|route| route.match_event(event).map(|matched| (route, matched)))
            .filter_map(|(route, matched)| self.render(event.source, route, &matched));
        let delivered = self.fan_out(outbound).await;
        self.log_outcome(event.source, &event.message, &delivered);
        delivered.len()
    }

    /// Fire every route with a matching custom trigger.
    pub async fn on_custom(&self, source: TransportId, name: &str) -> usize {
        let routes = self.routes.get(&source).map(Vec::as_slice).unwrap_or_default();
        let outbound = routes
            .iter()
            .filter(|r| r.matches_custom(name))
            .filter_map(|route| self.render(source, route, &RouteMatch::default()));
        let delivered = self.fan_out(outbound).await;
        self.log_outcome(source, name, &delivered);
        delivered.len()
    }

    fn render(
        &self,
        source: TransportId,
        route: &CompiledRoute,
        matched: &RouteMatch,
    ) -> Option<(TransportId, Event)> {
        match route.derive_event(source, matched) {
            Ok(outbound) => Some((route.target, outbound)),
            Err(e) => {
                warn!(
                    transport = %route.target,
                    "[{}->{}] message pattern failed: {}",
                    source, route.target, e
                );
                None
            }
        }
    }

    /// Deliver rendered events, one concurrent lane per destination.
    /// Events for the same destination keep their route order. Returns
    /// the destination of every successful send.
    async fn fan_out(
        &self,
        outbound: impl Iterator<Item = (TransportId, Event)>,
    ) -> Vec<TransportId> {
        let mut lanes: Vec<(TransportId, Vec<Event>)> = Vec::new();
        for (target, event) in outbound {
            match lanes.iter_mut().find(|(t, _)| *t == target) {
                Some((_, events)) => events.push(event),
                None => lanes.push((target, vec![event])),
            }
        }

        let sent = join_all(lanes.iter().map(|(target, events)| async move {
            let mut ok = 0;
            for event in events {
                if self.deliver(*target, event).await {
                    ok += 1;
                }
            }
            (*target, ok)
        }))
        .await;

        sent.into_iter()
            .flat_map(|(target, ok)| std::iter::repeat(target).take(ok))
            .collect()
    }

    /// Send one event to one transport, bounded by the send timeout.
    pub async fn deliver(&self, target: TransportId, event: &Event) -> bool {
        let Some(transport) = self.transports.get(target) else {
            debug!("Dropping event for disabled transport {}", target);
            return false;
        };

        let result = match tokio::time::timeout(self.send_timeout, transport.send(event)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                transport: target.to_string(),
            }),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(transport = %target, "Send failed: {}", e);
                false
            }
        }
    }

    fn log_outcome(&self, source: TransportId, text: &str, delivered: &[TransportId]) {
        if delivered.is_empty() {
            debug!("[{}->none] {}", source, text);
            return;
        }
        let targets: Vec<&str> = delivered.iter().map(TransportId::as_str).collect();
        info!("[{}->{}] {}", source, targets.join(","), text);
    }

    async fn handle(&self, input: HubInput) {
        match input {
            HubInput::Event(event) => {
                self.on_event(&event).await;
            }
            HubInput::Custom { source, name } => {
                self.on_custom(source, &name).await;
            }
            HubInput::Direct { target, event } => {
                if self.deliver(target, &event).await {
                    info!("[{}->{}] {}", event.source, target, event.message);
                }
            }
        }
    }

    /// Drain the input queue until shutdown. Inputs are handled one at a
    /// time, so per-source order is preserved.
    pub async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<HubInput>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                input = rx.recv() => {
                    match input {
                        Some(input) => self.handle(input).await,
                        None => {
                            debug!("Hub input channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping dispatch hub");
                        break;
                    }
                }
            }
        }
    }
}
