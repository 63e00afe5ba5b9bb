//! State of a single conversation thread.

use std::collections::VecDeque;

use infinigpt_core::{Role, Turn};
use serde::Serialize;

/// Settings a fresh or `.reset` session starts from.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub persona: Option<String>,
    pub model: String,
    pub max_turns: usize,
}

/// Text placed around a persona to form the system prompt.
#[derive(Debug, Clone, Default)]
pub struct PersonaFraming {
    pub prefix: String,
    pub suffix: String,
}

impl PersonaFraming {
    pub fn frame(&self, persona: &str) -> String {
        format!("{}{}{}", self.prefix, persona, self.suffix)
    }
}

/// Which system framing a session is using.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PromptMode<'a> {
    Persona(&'a str),
    Custom(&'a str),
    Stock,
}

/// Active persona/prompt, model, and chronological history of one
/// (room, user) pair.
///
/// At most one of `active_persona` / `active_custom_prompt` is ever set; all
/// mutators go through methods that keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    active_persona: Option<String>,
    active_custom_prompt: Option<String>,
    active_model: String,
    history: VecDeque<Turn>,
    max_turns: usize,
}

impl SessionState {
    pub fn new(defaults: &SessionDefaults) -> Self {
        Self {
            active_persona: defaults.persona.clone(),
            active_custom_prompt: None,
            active_model: defaults.model.clone(),
            history: VecDeque::new(),
            max_turns: defaults.max_turns.max(1),
        }
    }

    pub fn active_persona(&self) -> Option<&str> {
        self.active_persona.as_deref()
    }

    pub fn active_custom_prompt(&self) -> Option<&str> {
        self.active_custom_prompt.as_deref()
    }

    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    pub fn prompt_mode(&self) -> PromptMode<'_> {
        match (&self.active_custom_prompt, &self.active_persona) {
            (Some(custom), _) => PromptMode::Custom(custom),
            (None, Some(persona)) => PromptMode::Persona(persona),
            (None, None) => PromptMode::Stock,
        }
    }

    /// The effective system prompt, or `None` in stock mode.
    pub fn system_prompt(&self, framing: &PersonaFraming) -> Option<String> {
        match self.prompt_mode() {
            PromptMode::Persona(p) => Some(framing.frame(p)),
            PromptMode::Custom(c) => Some(c.to_string()),
            PromptMode::Stock => None,
        }
    }

    pub fn set_persona(&mut self, persona: impl Into<String>) {
        self.active_custom_prompt = None;
        self.active_persona = Some(persona.into());
    }

    pub fn set_custom_prompt(&mut self, prompt: impl Into<String>) {
        self.active_persona = None;
        self.active_custom_prompt = Some(prompt.into());
    }

    /// Back to the configured default persona and model, empty history.
    pub fn reset(&mut self, defaults: &SessionDefaults) {
        self.active_persona = defaults.persona.clone();
        self.active_custom_prompt = None;
        self.active_model = defaults.model.clone();
        self.history.clear();
    }

    /// No system framing at all, empty history. The model is kept.
    pub fn to_stock(&mut self) {
        self.active_persona = None;
        self.active_custom_prompt = None;
        self.history.clear();
    }

    /// Callers validate `model` against the catalog first.
    pub(crate) fn set_model(&mut self, model: impl Into<String>) {
        self.active_model = model.into();
    }

    /// Append a turn, evicting the oldest turns beyond the cap.
    pub fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        self.history.push_back(Turn {
            role,
            text: text.into(),
        });
        while self.history.len() > self.max_turns {
            self.history.pop_front();
        }
    }

    /// Record a confirmed user/assistant exchange.
    pub fn push_exchange(&mut self, user_text: impl Into<String>, reply: impl Into<String>) {
        self.push_turn(Role::User, user_text);
        self.push_turn(Role::Assistant, reply);
    }

    pub fn history(&self) -> Vec<Turn> {
        self.history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(cap: usize) -> SessionDefaults {
        SessionDefaults {
            persona: Some("a pirate".into()),
            model: "gpt-x".into(),
            max_turns: cap,
        }
    }

    #[test]
    fn new_session_uses_defaults() {
        let s = SessionState::new(&defaults(24));
        assert_eq!(s.active_persona(), Some("a pirate"));
        assert_eq!(s.active_model(), "gpt-x");
        assert_eq!(s.history_len(), 0);
    }

    #[test]
    fn persona_is_framed() {
        let s = SessionState::new(&defaults(24));
        let framing = PersonaFraming {
            prefix: "assume the personality of ".into(),
            suffix: ".".into(),
        };
        assert_eq!(
            s.system_prompt(&framing).as_deref(),
            Some("assume the personality of a pirate.")
        );
    }

    #[test]
    fn custom_prompt_is_used_verbatim() {
        let mut s = SessionState::new(&defaults(24));
        s.set_custom_prompt("You are terse.");
        let framing = PersonaFraming {
            prefix: "ignored ".into(),
            suffix: " ignored".into(),
        };
        assert_eq!(s.system_prompt(&framing).as_deref(), Some("You are terse."));
        assert_eq!(s.active_persona(), None);
    }

    #[test]
    fn prompt_modes_are_mutually_exclusive() {
        let d = defaults(24);
        let mut s = SessionState::new(&d);
        let ops: [&dyn Fn(&mut SessionState); 4] = [
            &|s: &mut SessionState| s.set_persona("wizard"),
            &|s: &mut SessionState| s.set_custom_prompt("raw"),
            &|s: &mut SessionState| s.reset(&d),
            &|s: &mut SessionState| s.to_stock(),
        ];
        // every ordered pair and a few longer runs
        for i in 0..ops.len() {
            for j in 0..ops.len() {
                for k in 0..ops.len() {
                    ops[i](&mut s);
                    ops[j](&mut s);
                    ops[k](&mut s);
                    assert!(
                        !(s.active_persona().is_some() && s.active_custom_prompt().is_some()),
                        "both modes active after ops {i},{j},{k}"
                    );
                }
            }
        }
        s.set_custom_prompt("raw");
        s.to_stock();
        assert_eq!(s.prompt_mode(), PromptMode::Stock);
    }

    #[test]
    fn history_keeps_most_recent_in_order() {
        let mut s = SessionState::new(&defaults(4));
        for i in 0..11 {
            s.push_turn(Role::User, format!("m{i}"));
            assert!(s.history_len() <= 4);
        }
        let texts: Vec<_> = s.history().into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["m7", "m8", "m9", "m10"]);
    }

    #[test]
    fn set_persona_keeps_history() {
        let mut s = SessionState::new(&defaults(24));
        s.push_exchange("hi", "hello");
        s.set_persona("a robot");
        s.set_persona("a robot");
        assert_eq!(s.history_len(), 2);
        assert_eq!(s.active_persona(), Some("a robot"));
    }

    #[test]
    fn reset_restores_defaults_and_stock_keeps_model() {
        let d = defaults(24);
        let mut s = SessionState::new(&d);
        s.set_model("gpt-y");
        s.set_custom_prompt("raw");
        s.push_exchange("a", "b");

        s.to_stock();
        assert_eq!(s.active_model(), "gpt-y");
        assert_eq!(s.history_len(), 0);

        s.reset(&d);
        assert_eq!(s.active_model(), "gpt-x");
        assert_eq!(s.active_persona(), Some("a pirate"));
    }
}
