//! InfiniGPT configuration schema.
//!
//! Every section is optional in the file; missing fields take the values from
//! [`crate::defaults`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotConfig {
    /// Matrix homeserver connection
    pub matrix: MatrixConfig,
    /// LLM gateway endpoint and request tuning
    pub gateway: GatewayConfig,
    /// Model allow-list and default
    pub models: ModelsConfig,
    /// Default personality and how it is framed
    pub persona: PersonaConfig,
    /// Outgoing message moderation
    pub moderation: ModerationConfig,
    /// Room and admin gating
    pub access: AccessConfig,
    /// Claims and key material for gateway tokens
    pub jwt: JwtConfig,
    /// Per-session history bounds
    pub history: HistoryConfig,
    /// `.help` text source
    pub help: HelpConfig,
    /// Log level and sinks
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatrixConfig {
    pub homeserver_url: String,
    /// Full user id of the bot, e.g. `@infinigpt:matrix.org`.
    pub user_id: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub sync_timeout_ms: u64,
    pub rejoin_interval_secs: u64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver_url: String::new(),
            user_id: String::new(),
            access_token: String::new(),
            device_id: None,
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            rejoin_interval_secs: DEFAULT_REJOIN_INTERVAL_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL of the XWiki LLM endpoint.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelsConfig {
    /// Models sessions may select when `restrict` is on.
    pub allowed: Vec<String>,
    pub restrict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ModelsConfig {
    pub fn default_model(&self) -> &str {
        self.default.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonaConfig {
    /// Personality every new session starts with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Text placed before the persona in the system prompt.
    pub prefix: String,
    /// Text placed after the persona in the system prompt.
    pub suffix: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            default: None,
            prefix: DEFAULT_PERSONA_PREFIX.to_string(),
            suffix: DEFAULT_PERSONA_SUFFIX.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

/// Which moderation strategy guards outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStrategy {
    #[default]
    ForbiddenWords,
    InjectionGuard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModerationConfig {
    pub enabled: bool,
    pub strategy: ModerationStrategy,
    pub forbidden_words: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: ModerationStrategy::default(),
            forbidden_words: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessConfig {
    /// User ids allowed to run admin-only commands.
    pub admins: Vec<String>,
    /// Rooms the bot serves (and joins on start).
    pub channels: Vec<String>,
    /// Accept invites to any room and serve every joined room.
    pub auto_join: bool,
    /// Command keys (e.g. `"model"`) restricted to admins.
    pub admin_commands: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            channels: Vec::new(),
            auto_join: true,
            admin_commands: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// JWT
// ---------------------------------------------------------------------------

/// The `aud` claim: the exact origin(s) the gateway expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Default for Audience {
    fn default() -> Self {
        Audience::Many(Vec::new())
    }
}

impl Audience {
    pub fn is_empty(&self) -> bool {
        match self {
            Audience::One(s) => s.trim().is_empty(),
            Audience::Many(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: Audience,
    pub groups: Vec<String>,
    pub expiration_hours: i64,
    pub private_key_path: PathBuf,
    /// Additional static claims merged into every token.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra_claims: serde_json::Map<String, serde_json::Value>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: Audience::default(),
            groups: vec![DEFAULT_JWT_GROUP.to_string()],
            expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
            extra_claims: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// History / help / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_HISTORY_MAX_TURNS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
            json: false,
        }
    }
}
