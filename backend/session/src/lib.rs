//! Conversation state for InfiniGPT: per-(room, user) sessions, their
//! persona/prompt mode, bounded history, and the model catalog.

pub mod models;
pub mod state;
pub mod store;

pub use models::{ModelCatalog, RESET_KEYWORD};
pub use state::{PersonaFraming, PromptMode, SessionDefaults, SessionState};
pub use store::{ConversationStore, SessionGuard};
