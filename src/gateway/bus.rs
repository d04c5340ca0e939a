// ABOUTME: External message-bus boundary: publish downstream records, consume outbound ones
// ABOUTME: ChannelBus is an in-process implementation used by tests and the bundled binaries

use crate::gateway::types::{BusRecord, OutboundMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Publishes `user_message` / `event` / `failure` records downstream.
pub trait BusPublisher: Send + Sync {
    fn publish(&self, record: BusRecord) -> impl std::future::Future<Output = ()> + Send;
}

/// The outbound-consuming side of the bus. Pause/resume is manipulated only by
/// the Throttler and the Transport Service, per the concurrency model.
pub trait BusConnector: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;

    fn recv(&self) -> impl std::future::Future<Output = Option<OutboundMessage>> + Send;
}

/// An in-process bus backed by an mpsc channel, with a shared pause flag that
/// `recv` honors by simply not polling the channel while paused.
pub struct ChannelBus {
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<OutboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    downstream_tx: mpsc::UnboundedSender<BusRecord>,
    paused: Arc<AtomicBool>,
}

impl ChannelBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BusRecord>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (downstream_tx, downstream_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound_rx: tokio::sync::Mutex::new(outbound_rx),
                outbound_tx,
                downstream_tx,
                paused: Arc::new(AtomicBool::new(false)),
            },
            downstream_rx,
        )
    }

    /// Handle callers use to enqueue outbound messages, as if from an external producer.
    pub fn sender(&self) -> mpsc::UnboundedSender<OutboundMessage> {
        self.outbound_tx.clone()
    }
}

impl BusPublisher for ChannelBus {
    async fn publish(&self, record: BusRecord) {
        // A closed downstream receiver just means nobody is listening; not our error to raise.
        let _ = self.downstream_tx.send(record);
    }
}

impl BusConnector for ChannelBus {
    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn recv(&self) -> Option<OutboundMessage> {
        loop {
            if self.paused.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
                continue;
            }
            let mut guard = self.outbound_rx.lock().await;
            return guard.recv().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::TransportType;

    #[tokio::test]
    async fn paused_connector_withholds_messages() {
        let (bus, _downstream) = ChannelBus::new();
        bus.pause();
        bus.sender()
            .send(OutboundMessage {
                message_id: "1".into(),
                to_addr: "1".into(),
                from_addr: "2".into(),
                content: "hi".into(),
                transport_type: TransportType::Sms,
                session_event: None,
            })
            .unwrap();

        let recv = tokio::time::timeout(std::time::Duration::from_millis(50), bus.recv()).await;
        assert!(recv.is_err(), "recv should not resolve while paused");

        bus.resume();
        let msg = tokio::time::timeout(std::time::Duration::from_millis(50), bus.recv())
            .await
            .expect("recv should resolve after resume")
            .expect("message should be present");
        assert_eq!(msg.message_id, "1");
    }

    #[tokio::test]
    async fn resume_is_idempotent() {
        let (bus, _downstream) = ChannelBus::new();
        bus.resume();
        bus.resume();
        assert!(!bus.is_paused());
    }
}
