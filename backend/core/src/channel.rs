use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::InboundEvent;

/// Default channel buffer size for inbound room events.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Inbound event bus between the chat transport and the dispatcher.
///
/// The transport holds a clone of `inbound_tx`; the dispatcher takes the
/// single receiver. Bounded, so a slow dispatcher applies backpressure to
/// the sync loop instead of buffering without limit.
pub struct EventBus {
    pub inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: Option<mpsc::Receiver<InboundEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer);
        info!(buffer_size = buffer, "EventBus initialized");
        Self {
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        }
    }

    /// Take the inbound receiver (can only be called once).
    pub fn take_inbound_rx(&mut self) -> Option<mpsc::Receiver<InboundEvent>> {
        debug!("Inbound receiver taken");
        self.inbound_rx.take()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_send_receive() {
        let mut bus = EventBus::new();
        let mut rx = bus.take_inbound_rx().unwrap();

        bus.inbound_tx
            .send(InboundEvent::new("!r:x", "@a:x", ".help"))
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.text, ".help");
    }

    #[tokio::test]
    async fn test_bus_take_rx_once() {
        let mut bus = EventBus::new();
        assert!(bus.take_inbound_rx().is_some());
        assert!(bus.take_inbound_rx().is_none());
    }

    #[tokio::test]
    async fn test_bus_backpressure() {
        let mut bus = EventBus::with_buffer_size(2);
        let _rx = bus.take_inbound_rx().unwrap();

        for _ in 0..2 {
            bus.inbound_tx
                .send(InboundEvent::new("!r:x", "@a:x", "fill"))
                .await
                .unwrap();
        }

        let result = bus
            .inbound_tx
            .try_send(InboundEvent::new("!r:x", "@a:x", "overflow"));
        assert!(result.is_err());
    }
}
