//! Config validation: field-level checks with user-friendly messages.

use crate::defaults::{MAX_JWT_EXPIRATION_HOURS, MAX_REJOIN_INTERVAL_SECS};
use crate::schema::{BotConfig, ModerationStrategy};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BotConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_matrix(config, &mut report);
    validate_gateway(config, &mut report);
    validate_models(config, &mut report);
    validate_moderation(config, &mut report);
    validate_access(config, &mut report);
    validate_jwt(config, &mut report);
    validate_history(config, &mut report);
    report
}

fn validate_matrix(config: &BotConfig, report: &mut ValidationReport) {
    let m = &config.matrix;
    if m.homeserver_url.trim().is_empty() {
        report.error("matrix.homeserverUrl", "Matrix homeserver URL is required");
    }
    if m.user_id.trim().is_empty() {
        report.error("matrix.userId", "Bot user id is required");
    } else if !m.user_id.starts_with('@') || !m.user_id.contains(':') {
        report.warn("matrix.userId", "Expected a full user id like @bot:example.org");
    }
    if m.access_token.trim().is_empty() {
        report.warn("matrix.accessToken", "No access token; the Matrix adapter cannot sync");
    }
    if m.rejoin_interval_secs == 0 || m.rejoin_interval_secs > MAX_REJOIN_INTERVAL_SECS {
        report.error(
            "matrix.rejoinIntervalSecs",
            format!("rejoinIntervalSecs must be between 1 and {MAX_REJOIN_INTERVAL_SECS}"),
        );
    }
}

fn validate_gateway(config: &BotConfig, report: &mut ValidationReport) {
    let gw = &config.gateway;
    if gw.endpoint.trim().is_empty() {
        report.error("gateway.endpoint", "Gateway endpoint is required");
    } else if !gw.endpoint.starts_with("http://") && !gw.endpoint.starts_with("https://") {
        report.error("gateway.endpoint", "Gateway endpoint must be an http(s) URL");
    }
    if gw.timeout_secs == 0 {
        report.error("gateway.timeoutSecs", "timeoutSecs must be >= 1");
    }
    if !(0.0..=2.0).contains(&gw.temperature) {
        report.error("gateway.temperature", "temperature must be between 0.0 and 2.0");
    }
}

fn validate_models(config: &BotConfig, report: &mut ValidationReport) {
    let models = &config.models;
    if !models.restrict {
        return;
    }
    if models.allowed.is_empty() {
        report.error("models.allowed", "restrict is on but no models are allowed");
        return;
    }
    let default = models.default_model();
    if !models.allowed.iter().any(|m| m == default) {
        report.error(
            "models.default",
            format!("Default model '{default}' is not in models.allowed"),
        );
    }
}

fn validate_moderation(config: &BotConfig, report: &mut ValidationReport) {
    let m = &config.moderation;
    if m.enabled && m.strategy == ModerationStrategy::ForbiddenWords && m.forbidden_words.is_empty() {
        report.warn(
            "moderation.forbiddenWords",
            "Moderation is enabled with an empty word list; nothing will be rejected",
        );
    }
}

fn validate_access(config: &BotConfig, report: &mut ValidationReport) {
    let a = &config.access;
    if !a.auto_join && a.channels.is_empty() {
        report.warn("access.channels", "autoJoin is off and no channels are configured; the bot will answer nowhere");
    }
    if !a.admin_commands.is_empty() && a.admins.is_empty() {
        report.warn("access.admins", "Admin-only commands are configured but no admins are listed");
    }
}

fn validate_jwt(config: &BotConfig, report: &mut ValidationReport) {
    let jwt = &config.jwt;
    if jwt.issuer.trim().is_empty() {
        report.error("jwt.issuer", "Token issuer is required");
    }
    if jwt.audience.is_empty() {
        report.error("jwt.audience", "Token audience is required");
    }
    if jwt.expiration_hours <= 0 || jwt.expiration_hours > MAX_JWT_EXPIRATION_HOURS {
        report.error(
            "jwt.expirationHours",
            format!("expirationHours must be between 1 and {MAX_JWT_EXPIRATION_HOURS}"),
        );
    }
    if jwt.private_key_path.as_os_str().is_empty() {
        report.error("jwt.privateKeyPath", "Private key path is required");
    }
}

fn validate_history(config: &BotConfig, report: &mut ValidationReport) {
    if config.history.max_turns == 0 {
        report.error("history.maxTurns", "maxTurns must be >= 1");
    } else if config.history.max_turns % 2 == 1 {
        report.warn(
            "history.maxTurns",
            "An odd cap splits user/assistant pairs on eviction",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Audience;

    fn valid() -> BotConfig {
        let mut cfg = BotConfig::default();
        cfg.matrix.homeserver_url = "https://matrix.example.org".into();
        cfg.matrix.user_id = "@bot:example.org".into();
        cfg.matrix.access_token = "syt_x".into();
        cfg.gateway.endpoint = "https://wiki.example.org/rest/v1".into();
        cfg.jwt.issuer = "infinigpt".into();
        cfg.jwt.audience = Audience::One("https://wiki.example.org".into());
        cfg
    }

    #[test]
    fn complete_config_is_valid() {
        let report = validate(&valid());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn empty_config_is_invalid() {
        let report = validate(&BotConfig::default());
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.path == "gateway.endpoint"));
        assert!(report.errors.iter().any(|e| e.path == "jwt.audience"));
    }

    #[test]
    fn restrict_requires_default_in_allow_list() {
        let mut cfg = valid();
        cfg.models.restrict = true;
        cfg.models.allowed = vec!["gpt-x".into(), "gpt-y".into()];
        cfg.models.default = Some("gpt-z".into());
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "models.default"));

        cfg.models.default = Some("gpt-x".into());
        assert!(validate(&cfg).is_valid());
    }

    #[test]
    fn expiration_hours_is_bounded() {
        let mut cfg = valid();
        cfg.jwt.expiration_hours = 10_000_000_000;
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "jwt.expirationHours"));

        cfg.jwt.expiration_hours = MAX_JWT_EXPIRATION_HOURS;
        assert!(validate(&cfg).is_valid());
    }

    #[test]
    fn rejoin_interval_is_bounded() {
        let mut cfg = valid();
        cfg.matrix.rejoin_interval_secs = u64::MAX;
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "matrix.rejoinIntervalSecs"));

        cfg.matrix.rejoin_interval_secs = 0;
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn zero_history_cap_is_error() {
        let mut cfg = valid();
        cfg.history.max_turns = 0;
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn empty_word_list_only_warns() {
        let cfg = valid();
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "moderation.forbiddenWords"));
    }
}
