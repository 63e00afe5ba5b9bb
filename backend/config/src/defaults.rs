//! Config defaults: constants for unset fields, plus normalization applied
//! after parsing.

use crate::schema::BotConfig;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "AI.Models.waise-llama3";

/// Persona framing around the personality text.
pub const DEFAULT_PERSONA_PREFIX: &str = "assume the personality of ";
pub const DEFAULT_PERSONA_SUFFIX: &str =
    ".  roleplay and never break character. keep your responses relatively short.";

/// Gateway round-trip limit.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature sent to the gateway.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Matrix `/sync` long-poll timeout.
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 30_000;

/// How often configured rooms are re-joined.
pub const DEFAULT_REJOIN_INTERVAL_SECS: u64 = 300;
/// Upper bound for the re-join timer (one week).
pub const MAX_REJOIN_INTERVAL_SECS: u64 = 7 * 24 * 3600;

pub const DEFAULT_JWT_GROUP: &str = "MatrixGroup";
pub const DEFAULT_JWT_EXPIRATION_HOURS: i64 = 3;
/// Tokens may live at most one year.
pub const MAX_JWT_EXPIRATION_HOURS: i64 = 24 * 365;
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "private.pem";

/// Turns kept per session before the oldest are evicted.
pub const DEFAULT_HISTORY_MAX_TURNS: usize = 24;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: BotConfig) -> BotConfig {
    let config = apply_model_defaults(config);
    let config = apply_moderation_defaults(config);
    apply_access_defaults(config)
}

/// Pin the default model explicitly so it shows up in `redact`/`check` output.
fn apply_model_defaults(mut config: BotConfig) -> BotConfig {
    if config.models.default.as_deref().map(str::trim).unwrap_or("").is_empty() {
        config.models.default = Some(DEFAULT_MODEL.to_string());
    }
    config.models.allowed.retain(|m| !m.trim().is_empty());
    config
}

/// Forbidden words are matched case-insensitively; store them lowercased.
fn apply_moderation_defaults(mut config: BotConfig) -> BotConfig {
    let mut words: Vec<String> = config
        .moderation
        .forbidden_words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    words.sort();
    words.dedup();
    config.moderation.forbidden_words = words;
    config
}

fn apply_access_defaults(mut config: BotConfig) -> BotConfig {
    for cmd in &mut config.access.admin_commands {
        *cmd = cmd.trim().trim_start_matches('.').to_lowercase();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_default_model() {
        let cfg = apply_all_defaults(BotConfig::default());
        assert_eq!(cfg.models.default.as_deref(), Some(DEFAULT_MODEL));
    }

    #[test]
    fn keeps_user_model() {
        let mut cfg = BotConfig::default();
        cfg.models.default = Some("gpt-x".into());
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.models.default.as_deref(), Some("gpt-x"));
    }

    #[test]
    fn normalizes_forbidden_words() {
        let mut cfg = BotConfig::default();
        cfg.moderation.forbidden_words = vec![" BadWord ".into(), "badword".into(), "".into()];
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.moderation.forbidden_words, vec!["badword".to_string()]);
    }

    #[test]
    fn admin_commands_drop_leading_dot() {
        let mut cfg = BotConfig::default();
        cfg.access.admin_commands = vec![".Model".into()];
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.access.admin_commands, vec!["model".to_string()]);
    }
}
