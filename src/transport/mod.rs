//! Transport adapters.
//!
//! Every external system the bridge talks to implements [`Transport`]. The
//! dispatch hub only ever sends through this trait; inbound traffic is pushed
//! by each adapter's own read loop into a [`HubHandle`](crate::bridge::HubHandle).

pub mod console;
pub mod discord;
pub mod eqlog;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::error::TransportResult;
use crate::common::{Event, TransportId};

pub use console::ConsoleTransport;
pub use discord::DiscordTransport;
pub use eqlog::EqLogTransport;

/// One protocol adapter at the system boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    fn id(&self) -> TransportId;

    fn is_connected(&self) -> bool;

    /// Establish the connection and start the adapter's read loop.
    async fn connect(&self) -> TransportResult<()>;

    async fn disconnect(&self) -> TransportResult<()>;

    /// Deliver an event. Fire-and-forget from the hub's point of view.
    async fn send(&self, event: &Event) -> TransportResult<()>;

    /// Liveness probe returning the number of players online, for
    /// transports that can answer one.
    async fn probe_online(&self) -> Option<TransportResult<usize>> {
        None
    }

    /// Update a presence/status line, for transports that display one.
    async fn set_status(&self, _status: &str) -> TransportResult<()> {
        Ok(())
    }
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn Transport>;

/// The set of enabled transports, keyed by id.
///
/// Built once at startup; disabled transports are never registered.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: HashMap<TransportId, SharedTransport>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, transport: SharedTransport) {
        self.transports.insert(transport.id(), transport);
    }

    pub fn get(&self, id: TransportId) -> Option<&SharedTransport> {
        self.transports.get(&id)
    }

    pub fn contains(&self, id: TransportId) -> bool {
        self.transports.contains_key(&id)
    }

    /// Transports in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedTransport> {
        TransportId::ALL
            .into_iter()
            .filter_map(|id| self.transports.get(&id))
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}
