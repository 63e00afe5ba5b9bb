/// Access policy: which rooms the bot answers in and who may run
/// admin-only commands.
use std::collections::HashSet;

use infinigpt_config::AccessConfig;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    /// Rooms explicitly configured for the bot.
    pub channels: HashSet<String>,
    /// If true, membership itself is the gate: every joined room is served.
    pub auto_join: bool,
    pub admins: HashSet<String>,
    /// Command keys only admins may run.
    pub admin_commands: HashSet<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            channels: config.channels.iter().cloned().collect(),
            auto_join: config.auto_join,
            admins: config.admins.iter().cloned().collect(),
            admin_commands: config.admin_commands.iter().cloned().collect(),
        }
    }

    /// Returns `true` if messages from this room should be handled.
    pub fn room_allowed(&self, room_id: &str) -> bool {
        if self.auto_join {
            return true;
        }
        let allowed = self.channels.contains(room_id);
        if !allowed {
            debug!("[Access] Dropping event from unconfigured room {}", room_id);
        }
        allowed
    }

    /// Returns `true` if an invite to this room should be accepted.
    pub fn should_join(&self, room_id: &str) -> bool {
        self.auto_join || self.channels.contains(room_id)
    }

    pub fn is_admin(&self, sender: &str) -> bool {
        self.admins.contains(sender)
    }

    pub fn requires_admin(&self, command_key: &str) -> bool {
        self.admin_commands.contains(command_key)
    }

    /// Whether `sender` may run `command_key`.
    pub fn may_run(&self, sender: &str, command_key: &str) -> bool {
        !self.requires_admin(command_key) || self.is_admin(sender)
    }
}
