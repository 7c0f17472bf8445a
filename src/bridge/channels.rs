//! Bridge channel management.
//!
//! Adapters never call the hub directly. They push [`HubInput`]s through a
//! cloneable [`HubHandle`]; the hub task drains them in arrival order.

use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::common::{Event, TransportId};

/// Work item for the dispatch hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubInput {
    /// An inbound text event to route by its source.
    Event(Event),
    /// A named non-text event (e.g. "serverup") from a transport.
    Custom { source: TransportId, name: String },
    /// A pre-rendered event for one specific transport, bypassing routes.
    Direct { target: TransportId, event: Event },
}

/// Cloneable sender side of the hub queue.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubInput>,
}

impl HubHandle {
    /// Queue an inbound event for routing.
    pub fn publish(&self, event: Event) {
        self.push(HubInput::Event(event));
    }

    /// Queue a custom trigger.
    pub fn custom(&self, source: TransportId, name: impl Into<String>) {
        self.push(HubInput::Custom {
            source,
            name: name.into(),
        });
    }

    /// Queue a direct delivery to one transport.
    pub fn direct(&self, target: TransportId, event: Event) {
        self.push(HubInput::Direct { target, event });
    }

    fn push(&self, input: HubInput) {
        if self.tx.send(input).is_err() {
            warn!("Dispatch hub stopped, dropping input");
        }
    }
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
    /// Template receiver; clone one per task.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Bundle of all channels created at startup.
pub struct ChannelBundle {
    /// Handle cloned into every adapter.
    pub hub: HubHandle,
    /// Receiver drained by the hub task.
    pub hub_rx: mpsc::UnboundedReceiver<HubInput>,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (tx, hub_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            hub: HubHandle { tx },
            hub_rx,
            control: ControlChannels {
                shutdown_tx,
                shutdown_rx,
            },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_preserves_order() {
        let mut bundle = ChannelBundle::new();
        let hub = bundle.hub.clone();

        hub.publish(Event::line(TransportId::Telnet, "one"));
        hub.custom(TransportId::Telnet, "serverup");
        hub.direct(TransportId::Discord, Event::line(TransportId::Telnet, "two"));

        assert_eq!(
            bundle.hub_rx.recv().await,
            Some(HubInput::Event(Event::line(TransportId::Telnet, "one")))
        );
        assert!(matches!(
            bundle.hub_rx.recv().await,
            Some(HubInput::Custom { ref name, .. }) if name == "serverup"
        ));
        assert!(matches!(
            bundle.hub_rx.recv().await,
            Some(HubInput::Direct { target: TransportId::Discord, .. })
        ));
    }

    #[test]
    fn test_push_after_hub_stopped_does_not_panic() {
        let bundle = ChannelBundle::new();
        let hub = bundle.hub.clone();
        drop(bundle);
        hub.publish(Event::line(TransportId::Telnet, "late"));
    }
}
