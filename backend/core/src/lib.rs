pub mod channel;
pub mod error;
pub mod traits;
pub mod types;

pub use channel::EventBus;
pub use error::{BotError, BotResult};
pub use traits::{ChatTransport, GatewayClient, GatewayReply, GatewayRequest, ModelInfo};
pub use types::{InboundEvent, OutboundMessage, Role, SessionKey, Turn};
