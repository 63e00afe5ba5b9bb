use async_trait::async_trait;
use infinigpt_core::InboundEvent;
use tokio::sync::mpsc;

pub mod matrix;

pub use matrix::MatrixAdapter;

/// A chat network connection that feeds room messages onto the event bus.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Run the adapter's background work (sync loop, membership upkeep).
    /// Returns only when the adapter stops.
    async fn start(&self, inbound_tx: mpsc::Sender<InboundEvent>) -> anyhow::Result<()>;
}
