use thiserror::Error;

/// Top-level error type for the InfiniGPT bot.
///
/// Only `Config` is fatal, and only at startup. Every other variant is scoped
/// to a single conversation turn and is turned into a generic chat reply via
/// [`BotError::user_message`].
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("model '{requested}' is not in the allowed model list")]
    InvalidModel {
        requested: String,
        allowed: Vec<String>,
    },

    #[error("message rejected by moderation ({category})")]
    ModerationRejected { category: String },

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("gateway did not answer within {0}s")]
    GatewayTimeout(u64),

    #[error("chat transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BotResult<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Text safe to show in a chat room. Never includes internal detail.
    pub fn user_message(&self) -> String {
        match self {
            BotError::InvalidModel { allowed, .. } => format!(
                "Invalid model name. Available models: {}",
                allowed.join(", ")
            ),
            BotError::ModerationRejected { .. } => {
                "This message violates the usage policy and was not sent.".to_string()
            }
            BotError::Config(_) => {
                "The bot is misconfigured. Please contact an administrator.".to_string()
            }
            BotError::Signing(_)
            | BotError::Gateway(_)
            | BotError::GatewayTimeout(_)
            | BotError::Transport(_)
            | BotError::Other(_) => {
                "An error occurred while generating a response. Please try again later."
                    .to_string()
            }
        }
    }

    /// Whether this error should stop the process from serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_model_lists_allowed_models() {
        let err = BotError::InvalidModel {
            requested: "gpt-z".into(),
            allowed: vec!["gpt-x".into(), "gpt-y".into()],
        };
        let msg = err.user_message();
        assert!(msg.contains("gpt-x, gpt-y"));
        assert!(!msg.contains("gpt-z"));
    }

    #[test]
    fn gateway_detail_is_not_leaked() {
        let err = BotError::Gateway("502 from upstream: stack trace ...".into());
        assert!(!err.user_message().contains("502"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn only_config_is_fatal() {
        assert!(BotError::Config("bad key".into()).is_fatal());
        assert!(!BotError::Signing("bad key".into()).is_fatal());
        assert!(!BotError::GatewayTimeout(30).is_fatal());
    }
}
