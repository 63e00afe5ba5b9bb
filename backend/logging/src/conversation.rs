//! Conversation Event Log
//!
//! Structured per-session events under the `conversation_events` target.
//! Entries carry metadata only: message text and matched moderation terms
//! never reach the log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ConversationEvent {
    TurnCompleted {
        model: String,
        prompt_chars: usize,
        reply_chars: usize,
        history_len: usize,
        borrowed_from: Option<String>,
    },
    ModerationRejected {
        category: String,
    },
    GatewayFailed {
        error_msg: String,
    },
    SettingsChanged {
        setting: String,
    },
}

#[derive(Debug, Serialize)]
pub struct ConversationLogEntry {
    pub session: String,
    pub timestamp: DateTime<Utc>,
    pub event: ConversationEvent,
}

pub struct ConversationLog;

impl ConversationLog {
    /// Record an event for a session, scrubbing credentials from error text.
    pub fn record(session: &str, mut event: ConversationEvent) -> ConversationLogEntry {
        if let ConversationEvent::GatewayFailed { error_msg } = &mut event {
            *error_msg = redact_sensitive_data(error_msg);
        }

        let entry = ConversationLogEntry {
            session: session.to_string(),
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "conversation_events", entry = %json, "Conversation event"),
            Err(_) => info!(target: "conversation_events", entry = ?entry, "Conversation event"),
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_are_scrubbed() {
        let entry = ConversationLog::record(
            "!r:x/@a:x",
            ConversationEvent::GatewayFailed {
                error_msg: "401 for Bearer eyJabc.eyJdef.ghi".into(),
            },
        );
        match entry.event {
            ConversationEvent::GatewayFailed { error_msg } => assert!(!error_msg.contains("eyJabc")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = ConversationLog::record(
            "s",
            ConversationEvent::ModerationRejected {
                category: "forbidden_term".into(),
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"ModerationRejected\""));
        assert!(json.contains("forbidden_term"));
    }
}
