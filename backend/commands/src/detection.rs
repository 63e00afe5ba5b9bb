/// Command and mention detection for inbound room messages.
use crate::registry::CommandRegistry;
use crate::types::{BotCommand, CommandArg, CommandInvocation};

/// How the bot can be addressed by name.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity {
    /// Full Matrix user id, e.g. `@infinigpt:matrix.org`.
    pub user_id: String,
    pub display_name: Option<String>,
}

impl BotIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// `infinigpt` for `@infinigpt:matrix.org`.
    pub fn localpart(&self) -> &str {
        let id = self.user_id.strip_prefix('@').unwrap_or(&self.user_id);
        id.split(':').next().unwrap_or(id)
    }

    /// Name used in replies and help text.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.localpart())
    }

    fn mention_forms(&self) -> Vec<String> {
        let mut forms = vec![self.user_id.clone()];
        if let Some(display) = &self.display_name {
            forms.push(format!("@{display}"));
            forms.push(display.clone());
        }
        forms.push(format!("@{}", self.localpart()));
        forms.push(self.localpart().to_string());
        forms.retain(|f| !f.is_empty() && f != "@");
        // longest first so "@bot:server" wins over "@bot"
        forms.sort_by_key(|f| std::cmp::Reverse(f.len()));
        forms
    }
}

/// Detect a dot command at the start of a message.
/// Returns `None` for plain text and for unknown commands.
pub fn detect_command(text: &str, registry: &CommandRegistry) -> Option<CommandInvocation> {
    let trimmed = text.trim();
    if !trimmed.starts_with('.') {
        return None;
    }

    let (alias_part, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(a, r)| (a, r.trim()))
        .unwrap_or((trimmed, ""));

    let def = registry.find_by_alias(alias_part)?;
    let args = parse_args(rest, &def.args);

    Some(CommandInvocation {
        key: def.key.clone(),
        args,
    })
}

fn parse_args(text: &str, arg_defs: &[CommandArg]) -> Vec<String> {
    if text.is_empty() || arg_defs.is_empty() {
        return vec![];
    }

    let mut result = Vec::new();
    let mut remaining = text.trim();

    for (i, def) in arg_defs.iter().enumerate() {
        if remaining.is_empty() {
            break;
        }
        if def.capture_remaining || i == arg_defs.len() - 1 {
            result.push(remaining.to_string());
            break;
        }
        let (token, rest) = remaining
            .split_once(char::is_whitespace)
            .map(|(t, r)| (t, r.trim()))
            .unwrap_or((remaining, ""));
        result.push(token.to_string());
        remaining = rest;
    }
    result
}

/// If the message starts by addressing the bot, return the rest of it.
///
/// Accepts `<name>: text`, `<name>, text` and `<name> text` for the bot's
/// user id, display name and localpart, with or without a leading `@`.
pub fn detect_mention(text: &str, identity: &BotIdentity) -> Option<String> {
    let trimmed = text.trim_start();
    for form in identity.mention_forms() {
        let Some(head) = trimmed.get(..form.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(&form) {
            continue;
        }
        let tail = &trimmed[form.len()..];
        let tail = tail
            .strip_prefix(':')
            .or_else(|| tail.strip_prefix(','))
            .unwrap_or(tail);
        // "@botty" must not match the mention form "@bot"
        if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
            continue;
        }
        let body = tail.trim();
        if body.is_empty() {
            return None;
        }
        return Some(body.to_string());
    }
    None
}

/// Convert a detected invocation into a command, checking required args.
pub fn to_command(inv: &CommandInvocation, registry: &CommandRegistry) -> BotCommand {
    let required = registry
        .find_by_key(&inv.key)
        .map(|d| d.required_args())
        .unwrap_or(0);
    if inv.args.len() < required {
        return BotCommand::Usage {
            key: inv.key.clone(),
        };
    }

    let arg = |i: usize| inv.args.get(i).cloned().unwrap_or_default();
    match inv.key.as_str() {
        "ai" => BotCommand::Chat { text: arg(0) },
        "x" => BotCommand::CrossChat {
            target: arg(0),
            text: arg(1),
        },
        "persona" => BotCommand::Persona { text: arg(0) },
        "custom" => BotCommand::Custom { text: arg(0) },
        "reset" => BotCommand::Reset,
        "stock" => BotCommand::Stock,
        "model" => match inv.args.first() {
            Some(name) => BotCommand::SetModel { name: name.clone() },
            None => BotCommand::ListModels,
        },
        "help" => BotCommand::Help,
        other => BotCommand::Usage {
            key: other.to_string(),
        },
    }
}

/// Classify a room message. `None` means the bot should stay silent.
///
/// A dot command always wins: a mention whose body is itself a dot command
/// runs that command instead of chatting.
pub fn parse_message(
    text: &str,
    registry: &CommandRegistry,
    identity: &BotIdentity,
) -> Option<BotCommand> {
    if let Some(inv) = detect_command(text, registry) {
        return Some(to_command(&inv, registry));
    }
    if text.trim_start().starts_with('.') {
        return None;
    }
    let body = detect_mention(text, identity)?;
    if let Some(inv) = detect_command(&body, registry) {
        return Some(to_command(&inv, registry));
    }
    Some(BotCommand::Chat { text: body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> BotIdentity {
        BotIdentity::new("@infinigpt:matrix.org").with_display_name("InfiniGPT")
    }

    fn parse(text: &str) -> Option<BotCommand> {
        parse_message(text, &CommandRegistry::new(), &bot())
    }

    #[test]
    fn ai_prefix_is_chat() {
        assert_eq!(
            parse(".ai hello there"),
            Some(BotCommand::Chat {
                text: "hello there".into()
            })
        );
    }

    #[test]
    fn mentions_are_chat() {
        for text in [
            "@infinigpt:matrix.org: hi",
            "InfiniGPT: hi",
            "infinigpt, hi",
            "@infinigpt hi",
        ] {
            assert_eq!(parse(text), Some(BotCommand::Chat { text: "hi".into() }), "{text}");
        }
    }

    #[test]
    fn near_miss_names_are_ignored() {
        assert_eq!(parse("infinigptx: hi"), None);
        assert_eq!(parse("InfiniGPT:"), None);
        assert_eq!(parse("hello everyone"), None);
    }

    #[test]
    fn unknown_dot_commands_are_ignored() {
        assert_eq!(parse(".weather berlin"), None);
        assert_eq!(parse(".aiden hi"), None);
    }

    #[test]
    fn prefix_command_wins_over_mention() {
        assert_eq!(parse("InfiniGPT: .reset"), Some(BotCommand::Reset));
    }

    #[test]
    fn cross_chat_splits_target_and_text() {
        assert_eq!(
            parse(".x alice what did they say?"),
            Some(BotCommand::CrossChat {
                target: "alice".into(),
                text: "what did they say?".into()
            })
        );
        assert_eq!(parse(".x alice"), Some(BotCommand::Usage { key: "x".into() }));
    }

    #[test]
    fn model_with_and_without_argument() {
        assert_eq!(parse(".model"), Some(BotCommand::ListModels));
        assert_eq!(parse(".models"), Some(BotCommand::ListModels));
        assert_eq!(
            parse(".model gpt-y"),
            Some(BotCommand::SetModel {
                name: "gpt-y".into()
            })
        );
    }

    #[test]
    fn persona_captures_full_text() {
        assert_eq!(
            parse(".persona a grumpy  old wizard"),
            Some(BotCommand::Persona {
                text: "a grumpy  old wizard".into()
            })
        );
        assert_eq!(parse(".persona"), Some(BotCommand::Usage { key: "persona".into() }));
    }

    #[test]
    fn localpart_and_name() {
        let id = BotIdentity::new("@bot:example.org");
        assert_eq!(id.localpart(), "bot");
        assert_eq!(id.name(), "bot");
        assert_eq!(bot().name(), "InfiniGPT");
    }
}
