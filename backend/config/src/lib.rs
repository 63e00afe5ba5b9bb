//! `infinigpt-config`: bot configuration loading.
//!
//! Provides:
//! - Typed config schema (Matrix, gateway, models, persona, moderation, access, JWT)
//! - YAML/JSON file reading
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with path-qualified messages
//! - Redaction for safe logging

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{default_config_path, load_raw, parse_raw};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    AccessConfig, Audience, BotConfig, GatewayConfig, HelpConfig, HistoryConfig, JwtConfig,
    LoggingConfig, MatrixConfig, ModelsConfig, ModerationConfig, ModerationStrategy,
    PersonaConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Context;
use infinigpt_core::{BotError, BotResult};
use serde_json::Value;
use std::path::Path;

/// Load, substitute env vars, apply defaults, and validate a config file.
///
/// Any failure is a [`BotError::Config`]; the process must not start serving.
pub async fn load_and_prepare(path: &Path) -> BotResult<BotConfig> {
    let raw = load_raw(path)
        .await
        .map_err(|e| BotError::Config(format!("{e:#}")))?;
    prepare(raw)
}

/// The in-memory half of [`load_and_prepare`].
pub fn prepare(raw: Value) -> BotResult<BotConfig> {
    let value = resolve_env_vars(&raw).map_err(|e| BotError::Config(e.to_string()))?;

    let config: BotConfig = serde_json::from_value(value)
        .context("Failed to deserialize config")
        .map_err(|e| BotError::Config(format!("{e:#}")))?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        return Err(BotError::Config(first.to_string()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
matrix:
  homeserverUrl: https://matrix.example.org
  userId: "@infinigpt:example.org"
  accessToken: syt_token
gateway:
  endpoint: https://wiki.example.org/rest/v1
models:
  allowed: [gpt-x, gpt-y]
  restrict: true
  default: gpt-x
moderation:
  forbiddenWords: [BadWord]
jwt:
  issuer: infinigpt
  audience: https://wiki.example.org
"#;

    #[test]
    fn prepares_sample_config() {
        let cfg = prepare(parse_raw(SAMPLE).unwrap()).unwrap();
        assert_eq!(cfg.models.default_model(), "gpt-x");
        assert_eq!(cfg.moderation.forbidden_words, vec!["badword".to_string()]);
        assert_eq!(cfg.jwt.expiration_hours, 3);
    }

    #[test]
    fn invalid_config_is_config_error() {
        let err = prepare(parse_raw("history:\n  maxTurns: 0\n").unwrap()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_types_are_config_error() {
        let err = prepare(parse_raw("history:\n  maxTurns: lots\n").unwrap()).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }
}
