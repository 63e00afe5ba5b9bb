/// Built-in chat commands and the generated help text.
use crate::types::{CommandArg, CommandDef};

fn arg(name: &str, required: bool, capture: bool) -> CommandArg {
    CommandArg {
        name: name.to_string(),
        required,
        capture_remaining: capture,
    }
}

fn required_arg(name: &str) -> CommandArg {
    arg(name, true, false)
}

fn remaining_arg(name: &str) -> CommandArg {
    arg(name, true, true)
}

fn optional_arg(name: &str) -> CommandArg {
    arg(name, false, true)
}

fn def(key: &str, aliases: &[&str], args: Vec<CommandArg>, description: &str) -> CommandDef {
    CommandDef {
        key: key.into(),
        description: description.into(),
        text_aliases: aliases.iter().map(|a| a.to_string()).collect(),
        args,
    }
}

/// Build the built-in command registry.
pub fn builtin_commands() -> Vec<CommandDef> {
    vec![
        def(
            "ai",
            &[".ai"],
            vec![remaining_arg("message")],
            "Chat with the bot. Addressing the bot by name works too.",
        ),
        def(
            "x",
            &[".x"],
            vec![required_arg("user"), remaining_arg("message")],
            "Chat using another user's conversation in this room as context.",
        ),
        def(
            "persona",
            &[".persona"],
            vec![remaining_arg("persona")],
            "Have the bot take on a persona (a character, a style, anything).",
        ),
        def(
            "custom",
            &[".custom"],
            vec![remaining_arg("prompt")],
            "Use your own system prompt instead of a persona.",
        ),
        def(
            "reset",
            &[".reset"],
            vec![],
            "Clear your history and go back to the default persona and model.",
        ),
        def(
            "stock",
            &[".stock"],
            vec![],
            "Clear your history and drop all persona/system prompt settings.",
        ),
        def(
            "model",
            &[".model", ".models"],
            vec![optional_arg("name")],
            "Show the current and available models, or switch model (`reset` for the default).",
        ),
        def("help", &[".help"], vec![], "Show this help."),
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    commands: Vec<CommandDef>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: builtin_commands(),
        }
    }

    pub fn all(&self) -> &[CommandDef] {
        &self.commands
    }

    /// Find a command by dot alias (e.g. ".persona"). Case-insensitive.
    pub fn find_by_alias(&self, alias: &str) -> Option<&CommandDef> {
        let lower = alias.to_lowercase();
        self.commands
            .iter()
            .find(|c| c.text_aliases.iter().any(|a| *a == lower))
    }

    pub fn find_by_key(&self, key: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.key == key)
    }

    /// Markdown help listing every command.
    pub fn help_text(&self, bot_name: &str) -> String {
        let mut lines = vec![format!("**{bot_name} commands**"), String::new()];
        for cmd in &self.commands {
            lines.push(format!("- `{}`: {}", cmd.usage(), cmd.description));
        }
        lines.join("\n")
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_unique() {
        let registry = CommandRegistry::new();
        let mut seen = std::collections::HashSet::new();
        for cmd in registry.all() {
            for alias in &cmd.text_aliases {
                assert!(alias.starts_with('.'), "{alias} lacks the dot prefix");
                assert!(seen.insert(alias.clone()), "duplicate alias {alias}");
            }
        }
    }

    #[test]
    fn models_is_an_alias_of_model() {
        let registry = CommandRegistry::new();
        assert_eq!(registry.find_by_alias(".MODELS").unwrap().key, "model");
    }

    #[test]
    fn help_lists_every_command() {
        let registry = CommandRegistry::new();
        let help = registry.help_text("InfiniGPT");
        for cmd in registry.all() {
            assert!(help.contains(cmd.primary_alias()));
        }
        assert!(help.contains("`.x <user> <message>`"));
        assert!(help.contains("`.model [name]`"));
    }
}
