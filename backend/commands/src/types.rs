/// Chat command types.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandArg {
    pub name: String,
    pub required: bool,
    /// If true, consumes all remaining text.
    pub capture_remaining: bool,
}

// ---------------------------------------------------------------------------
// Command definition
// ---------------------------------------------------------------------------

/// A command entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    /// Unique key (e.g. "ai", "persona", "model"). Admin gating uses this.
    pub key: String,
    pub description: String,
    /// Dot-prefixed aliases; the first one is shown in help.
    pub text_aliases: Vec<String>,
    pub args: Vec<CommandArg>,
}

impl CommandDef {
    pub fn primary_alias(&self) -> &str {
        self.text_aliases.first().map(|s| s.as_str()).unwrap_or(&self.key)
    }

    /// e.g. `.x <user> <message>`
    pub fn usage(&self) -> String {
        let mut usage = self.primary_alias().to_string();
        for arg in &self.args {
            if arg.required {
                usage.push_str(&format!(" <{}>", arg.name));
            } else {
                usage.push_str(&format!(" [{}]", arg.name));
            }
        }
        usage
    }

    pub fn required_args(&self) -> usize {
        self.args.iter().filter(|a| a.required).count()
    }
}

// ---------------------------------------------------------------------------
// Parsed invocation
// ---------------------------------------------------------------------------

/// A detected dot-command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub key: String,
    /// Positional arguments parsed from remaining text.
    pub args: Vec<String>,
}

/// What an incoming room message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `.ai <text>` or a message addressed to the bot.
    Chat { text: String },
    /// `.x <user> <text>`: chat with `user`'s history as extra context.
    CrossChat { target: String, text: String },
    Persona { text: String },
    Custom { text: String },
    Reset,
    Stock,
    ListModels,
    SetModel { name: String },
    Help,
    /// A known command missing required arguments.
    Usage { key: String },
}

impl BotCommand {
    /// Registry key used for admin gating.
    pub fn key(&self) -> &str {
        match self {
            BotCommand::Chat { .. } => "ai",
            BotCommand::CrossChat { .. } => "x",
            BotCommand::Persona { .. } => "persona",
            BotCommand::Custom { .. } => "custom",
            BotCommand::Reset => "reset",
            BotCommand::Stock => "stock",
            BotCommand::ListModels | BotCommand::SetModel { .. } => "model",
            BotCommand::Help => "help",
            BotCommand::Usage { key } => key.as_str(),
        }
    }

    /// Read-only commands never need admin rights.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            BotCommand::ListModels | BotCommand::Help | BotCommand::Usage { .. }
        )
    }
}
