//! Structured logging for InfiniGPT.
//!
//! Console + optional rolling NDJSON file output, secret scrubbing, and the
//! conversation event log.

pub mod conversation;
pub mod logger;
pub mod redact;

pub use conversation::{ConversationEvent, ConversationLog, ConversationLogEntry};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
