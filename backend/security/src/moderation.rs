/// Moderation filter: decides whether an outgoing user message may be
/// forwarded to the gateway.
///
/// Strategies share the [`ContentPolicy`] capability; configuration picks one
/// at startup. A rejection carries the matched term for the caller, but only
/// the category is ever logged.
use infinigpt_config::{ModerationConfig, ModerationStrategy};
use infinigpt_core::{BotError, BotResult};
use tracing::{debug, warn};

/// Phrases that indicate a prompt injection attempt.
const INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous",
    "disregard previous",
    "forget what i said",
    "new instruction:",
    "system prompt:",
    "your new rules",
    "override system",
    "jailbreak",
    "do anything now",
    "dan mode",
    "developer mode enabled",
];

/// Why a message was rejected. Safe to log and to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCategory {
    ForbiddenTerm,
    PromptInjection,
}

impl RejectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectCategory::ForbiddenTerm => "forbidden_term",
            RejectCategory::PromptInjection => "prompt_injection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Rejected {
        category: RejectCategory,
        /// The configured term that matched. Never log this.
        matched: String,
    },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// A moderation strategy: text in, verdict out.
pub trait ContentPolicy: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, text: &str) -> Verdict;
}

/// Case-insensitive substring match against a word list.
pub struct ForbiddenWords {
    words: Vec<String>,
}

impl ForbiddenWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }
}

impl ContentPolicy for ForbiddenWords {
    fn name(&self) -> &str {
        "forbidden_words"
    }

    fn check(&self, text: &str) -> Verdict {
        let lower = text.to_lowercase();
        match self.words.iter().find(|w| lower.contains(w.as_str())) {
            Some(word) => Verdict::Rejected {
                category: RejectCategory::ForbiddenTerm,
                matched: word.clone(),
            },
            None => Verdict::Allowed,
        }
    }
}

/// Rejects known prompt-injection phrasing, plus any configured words.
pub struct InjectionGuard {
    words: ForbiddenWords,
}

impl InjectionGuard {
    pub fn new<I, S>(extra_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: ForbiddenWords::new(extra_words),
        }
    }
}

impl ContentPolicy for InjectionGuard {
    fn name(&self) -> &str {
        "injection_guard"
    }

    fn check(&self, text: &str) -> Verdict {
        let lower = text.to_lowercase();
        if let Some(pattern) = INJECTION_PATTERNS.iter().find(|p| lower.contains(*p)) {
            return Verdict::Rejected {
                category: RejectCategory::PromptInjection,
                matched: pattern.to_string(),
            };
        }
        self.words.check(text)
    }
}

/// The configured moderation gate. Disabled means every message is allowed.
pub struct ModerationFilter {
    policy: Option<Box<dyn ContentPolicy>>,
}

impl ModerationFilter {
    pub fn from_config(config: &ModerationConfig) -> Self {
        if !config.enabled {
            debug!("[Moderation] Disabled");
            return Self::disabled();
        }
        let policy: Box<dyn ContentPolicy> = match config.strategy {
            ModerationStrategy::ForbiddenWords => {
                Box::new(ForbiddenWords::new(&config.forbidden_words))
            }
            ModerationStrategy::InjectionGuard => {
                Box::new(InjectionGuard::new(&config.forbidden_words))
            }
        };
        debug!(strategy = policy.name(), "[Moderation] Enabled");
        Self::with_policy(policy)
    }

    pub fn with_policy(policy: Box<dyn ContentPolicy>) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    pub fn disabled() -> Self {
        Self { policy: None }
    }

    pub fn check(&self, text: &str) -> Verdict {
        let Some(policy) = &self.policy else {
            return Verdict::Allowed;
        };
        let verdict = policy.check(text);
        if let Verdict::Rejected { category, .. } = &verdict {
            warn!(strategy = policy.name(), category = category.as_str(), "[Moderation] Message rejected");
        }
        verdict
    }

    /// `check` as a `Result`, for callers that short-circuit with `?`.
    pub fn ensure_allowed(&self, text: &str) -> BotResult<()> {
        match self.check(text) {
            Verdict::Allowed => Ok(()),
            Verdict::Rejected { category, .. } => Err(BotError::ModerationRejected {
                category: category.as_str().to_string(),
            }),
        }
    }
}
