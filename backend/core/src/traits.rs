use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::types::{OutboundMessage, Turn};

/// A single generation request for the LLM gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub model: String,
    /// `None` in stock mode.
    pub system_prompt: Option<String>,
    /// Context turns followed by the new user turn.
    pub messages: Vec<Turn>,
    pub temperature: f32,
}

/// Text generated by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
}

/// A model advertised by the gateway's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub id: String,
}

/// The remote LLM gateway. Every call carries a freshly minted bearer token.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Generate a reply for the given request.
    async fn complete(&self, request: &GatewayRequest, token: &str) -> BotResult<GatewayReply>;

    /// List the models the gateway currently serves.
    async fn list_models(&self, token: &str) -> BotResult<Vec<ModelInfo>>;
}

/// Outbound half of the chat protocol, plus the lookups the router needs.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> BotResult<()>;

    /// Human-readable name for a user id, if the transport knows one.
    async fn display_name(&self, user_id: &str) -> Option<String>;
}
