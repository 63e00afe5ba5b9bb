use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one conversation thread: a user inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub room_id: String,
    pub user_id: String,
}

impl SessionKey {
    pub fn new(room_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_id, self.user_id)
    }
}

/// Who produced a turn of conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single exchanged message in a session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    /// Copy of this turn labelled with the participant it belongs to, so a
    /// model reading borrowed history can tell speakers apart.
    pub fn attributed_to(&self, speaker: &str) -> Self {
        let text = match self.role {
            Role::User => format!("[{speaker}] {}", self.text),
            Role::Assistant => format!("[reply to {speaker}] {}", self.text),
        };
        Self {
            role: self.role,
            text,
        }
    }
}

/// A room message delivered by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub room_id: String,
    pub sender_id: String,
    pub text: String,
    pub event_id: String,
    /// Server-side timestamp, when the transport provides one.
    #[serde(default)]
    pub origin_ts: Option<DateTime<Utc>>,
}

impl InboundEvent {
    pub fn new(
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            event_id: String::new(),
            origin_ts: None,
        }
    }

    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.room_id, &self.sender_id)
    }
}

/// A reply the bot wants delivered to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub room_id: String,
    pub body: String,
    /// Rich rendering of `body`, for transports that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
}

impl OutboundMessage {
    pub fn text(room_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            body: body.into(),
            formatted_body: None,
        }
    }

    pub fn with_formatted(mut self, html: impl Into<String>) -> Self {
        self.formatted_body = Some(html.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_display() {
        let key = SessionKey::new("!room:example.org", "@alice:example.org");
        assert_eq!(key.to_string(), "!room:example.org/@alice:example.org");
    }

    #[test]
    fn attribution_marks_speaker() {
        let t = Turn::user("hi").attributed_to("@alice:example.org");
        assert_eq!(t.role, Role::User);
        assert!(t.text.starts_with("[@alice:example.org]"));

        let a = Turn::assistant("hello").attributed_to("alice");
        assert_eq!(a.role, Role::Assistant);
        assert!(a.text.contains("reply to alice"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("x")).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
