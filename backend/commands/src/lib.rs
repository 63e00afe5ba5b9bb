//! Chat command handling for InfiniGPT: message classification, the command
//! router that drives conversation turns, and per-room dispatch.

pub mod detection;
pub mod dispatcher;
pub mod format;
pub mod registry;
pub mod router;
pub mod types;

pub use detection::{detect_command, detect_mention, parse_message, BotIdentity};
pub use dispatcher::RoomDispatcher;
pub use format::{attribute, render_markdown};
pub use registry::{builtin_commands, CommandRegistry};
pub use router::{CommandRouter, RouterSettings};
pub use types::{BotCommand, CommandArg, CommandDef, CommandInvocation};
