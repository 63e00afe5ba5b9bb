//! Routes one room message to a command or a conversation turn.
//!
//! The router is stateless between messages. Everything it remembers lives
//! in the [`ConversationStore`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use infinigpt_config::BotConfig;
use infinigpt_core::{
    BotError, BotResult, ChatTransport, GatewayClient, GatewayRequest, InboundEvent,
    OutboundMessage, SessionKey, Turn,
};
use infinigpt_logging::{redact_sensitive_data, ConversationEvent, ConversationLog};
use infinigpt_security::{AccessPolicy, ModerationFilter, RequestSigner, Verdict};
use infinigpt_session::{ConversationStore, PromptMode};

use crate::detection::{parse_message, BotIdentity};
use crate::format::{attribute, render_markdown};
use crate::registry::CommandRegistry;
use crate::types::BotCommand;

const PERSONA_REJECTED: &str =
    "This persona violates the usage policy and was not set. Choose a new persona.";
const CUSTOM_REJECTED: &str = "This custom prompt violates the usage policy and was not set.";
const HELP_FILE_ERROR: &str =
    "An error occurred while loading the help file. Please try again later.";

/// Per-process settings the router reads on every message.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub identity: BotIdentity,
    /// Events older than this are replays from before startup and are dropped.
    pub started_at: Option<DateTime<Utc>>,
    pub turn_timeout: Duration,
    pub temperature: f32,
    pub help_file: Option<PathBuf>,
}

impl RouterSettings {
    pub fn new(identity: BotIdentity) -> Self {
        Self {
            identity,
            started_at: None,
            turn_timeout: Duration::from_secs(60),
            temperature: 1.0,
            help_file: None,
        }
    }

    pub fn from_config(config: &BotConfig, identity: BotIdentity) -> Self {
        Self {
            identity,
            started_at: Some(Utc::now()),
            turn_timeout: Duration::from_secs(config.gateway.timeout_secs.max(1)),
            temperature: config.gateway.temperature,
            help_file: config.help.file.clone(),
        }
    }
}

pub struct CommandRouter {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn GatewayClient>,
    transport: Arc<dyn ChatTransport>,
    signer: Arc<dyn RequestSigner>,
    moderation: ModerationFilter,
    access: AccessPolicy,
    registry: CommandRegistry,
    settings: RouterSettings,
}

impl CommandRouter {
    pub fn new(
        store: Arc<ConversationStore>,
        gateway: Arc<dyn GatewayClient>,
        transport: Arc<dyn ChatTransport>,
        signer: Arc<dyn RequestSigner>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            transport,
            signer,
            moderation: ModerationFilter::disabled(),
            access: AccessPolicy {
                auto_join: true,
                ..AccessPolicy::default()
            },
            registry: CommandRegistry::new(),
            settings,
        }
    }

    pub fn with_moderation(mut self, moderation: ModerationFilter) -> Self {
        self.moderation = moderation;
        self
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Ask the gateway which models it serves and update the catalog.
    pub async fn refresh_models(&self) -> BotResult<usize> {
        let token = self.signer.issue(&self.settings.identity.user_id)?;
        let models = self.gateway.list_models(&token).await?;
        let count = models.len();
        self.store.catalog().refresh(models).await;
        info!(count, "Fetched gateway model list");
        Ok(count)
    }

    /// Handle an event and deliver the reply, if any, through the transport.
    pub async fn process(&self, event: &InboundEvent) {
        let Some(reply) = self.handle(event).await else {
            return;
        };
        if let Err(e) = self.transport.send(&reply).await {
            warn!(
                room = %reply.room_id,
                error = %redact_sensitive_data(&e.to_string()),
                "Failed to deliver reply"
            );
        }
    }

    /// Decide what, if anything, to answer to `event`.
    ///
    /// `None` means stay silent: own messages, replays, unconfigured rooms
    /// and anything that is not addressed to the bot.
    pub async fn handle(&self, event: &InboundEvent) -> Option<OutboundMessage> {
        if event.sender_id == self.settings.identity.user_id {
            return None;
        }
        if self.is_stale(event) {
            debug!(room = %event.room_id, event_id = %event.event_id, "Dropping stale event");
            return None;
        }
        if !self.access.room_allowed(&event.room_id) {
            return None;
        }
        let command = parse_message(&event.text, &self.registry, &self.settings.identity)?;

        let sender_name = self.display_name(&event.sender_id).await;
        let key = event.session_key();
        debug!(session = %key, command = command.key(), "Routing message");

        if !command.is_read_only() && !self.access.may_run(&event.sender_id, command.key()) {
            warn!(
                room = %event.room_id,
                sender = %event.sender_id,
                command = command.key(),
                "Admin command refused"
            );
            return Some(self.reply(
                event,
                format!(
                    "{sender_name}: You do not have permission to use .{}.",
                    command.key()
                ),
            ));
        }

        let reply = match command {
            BotCommand::Chat { text } => self.converse(event, &key, &sender_name, &text, None).await,
            BotCommand::CrossChat { target, text } => {
                self.cross_chat(event, &key, &sender_name, &target, &text)
                    .await
            }
            BotCommand::Persona { text } => {
                if let Verdict::Rejected { category, .. } = self.moderation.check(&text) {
                    self.record_rejection(&key, category.as_str());
                    return Some(self.reply(event, format!("{sender_name}: {PERSONA_REJECTED}")));
                }
                self.store.set_persona(&key, &text).await;
                self.record_setting(&key, "persona");
                self.reply(event, format!("Persona set for {sender_name}."))
            }
            BotCommand::Custom { text } => {
                if let Verdict::Rejected { category, .. } = self.moderation.check(&text) {
                    self.record_rejection(&key, category.as_str());
                    return Some(self.reply(event, format!("{sender_name}: {CUSTOM_REJECTED}")));
                }
                self.store.set_custom_prompt(&key, &text).await;
                self.record_setting(&key, "custom_prompt");
                self.reply(event, format!("Custom prompt set for {sender_name}."))
            }
            BotCommand::Reset => {
                self.store.reset(&key).await;
                self.record_setting(&key, "reset");
                self.reply(
                    event,
                    format!(
                        "{} reset to default for {sender_name}",
                        self.settings.identity.name()
                    ),
                )
            }
            BotCommand::Stock => {
                self.store.to_stock(&key).await;
                self.record_setting(&key, "stock");
                self.reply(event, format!("Stock settings applied for {sender_name}"))
            }
            BotCommand::ListModels => self.list_models(event, &key).await,
            BotCommand::SetModel { name } => match self.store.set_model(&key, &name).await {
                Ok(model) => {
                    self.record_setting(&key, "model");
                    self.reply(event, format!("Model set to {model} for {sender_name}"))
                }
                Err(e) => {
                    debug!(session = %key, error = %e, "Model change refused");
                    self.reply(event, e.user_message())
                }
            },
            BotCommand::Help => self.help(event, &sender_name).await,
            BotCommand::Usage { key: command_key } => {
                let usage = self
                    .registry
                    .find_by_key(&command_key)
                    .map(|d| d.usage())
                    .unwrap_or(command_key);
                self.reply(event, format!("Usage: {usage}"))
            }
        };
        Some(reply)
    }

    fn is_stale(&self, event: &InboundEvent) -> bool {
        match (self.settings.started_at, event.origin_ts) {
            (Some(started), Some(sent)) => sent < started,
            _ => false,
        }
    }

    async fn display_name(&self, user_id: &str) -> String {
        self.transport
            .display_name(user_id)
            .await
            .unwrap_or_else(|| user_id.to_string())
    }

    fn reply(&self, event: &InboundEvent, body: String) -> OutboundMessage {
        OutboundMessage::text(&event.room_id, body)
    }

    fn record_setting(&self, key: &SessionKey, setting: &str) {
        ConversationLog::record(
            &key.to_string(),
            ConversationEvent::SettingsChanged {
                setting: setting.to_string(),
            },
        );
    }

    fn record_rejection(&self, key: &SessionKey, category: &str) {
        ConversationLog::record(
            &key.to_string(),
            ConversationEvent::ModerationRejected {
                category: category.to_string(),
            },
        );
    }

    // -----------------------------------------------------------------------
    // Conversation turns
    // -----------------------------------------------------------------------

    /// `.x`: resolve the target, borrow their history, then chat as usual.
    async fn cross_chat(
        &self,
        event: &InboundEvent,
        key: &SessionKey,
        sender_name: &str,
        target: &str,
        text: &str,
    ) -> OutboundMessage {
        let Some(target_id) = self.resolve_target(&event.room_id, target).await else {
            return self.reply(event, format!("No conversation history found for {target}."));
        };
        if target_id == event.sender_id {
            return self.converse(event, key, sender_name, text, None).await;
        }

        // Snapshot before taking our own lock so two users borrowing from
        // each other cannot deadlock.
        let target_key = SessionKey::new(&event.room_id, &target_id);
        let history = self.store.read_history(&target_key).await;
        if history.is_empty() {
            return self.reply(event, format!("No conversation history found for {target}."));
        }
        let label = self.display_name(&target_id).await;
        let borrowed = Borrowed {
            from: target_id,
            turns: history.iter().map(|t| t.attributed_to(&label)).collect(),
        };
        self.converse(event, key, sender_name, text, Some(borrowed))
            .await
    }

    /// Match `.x` targets by user id first, then by display name.
    async fn resolve_target(&self, room_id: &str, target: &str) -> Option<String> {
        let users = self.store.users_in_room(room_id).await;
        if let Some(user) = users.iter().find(|u| u.as_str() == target) {
            return Some(user.clone());
        }
        for user in users {
            if let Some(name) = self.transport.display_name(&user).await {
                if name == target || name.eq_ignore_ascii_case(target) {
                    return Some(user);
                }
            }
        }
        None
    }

    async fn converse(
        &self,
        event: &InboundEvent,
        key: &SessionKey,
        sender_name: &str,
        text: &str,
        borrowed: Option<Borrowed>,
    ) -> OutboundMessage {
        match self.run_turn(key, text, borrowed).await {
            Ok(reply) => {
                let body = attribute(sender_name, &reply);
                let html = render_markdown(&body);
                OutboundMessage::text(&event.room_id, body).with_formatted(html)
            }
            Err(BotError::ModerationRejected { category }) => {
                self.record_rejection(key, &category);
                let notice = BotError::ModerationRejected { category }.user_message();
                self.reply(event, format!("{sender_name}: {notice}"))
            }
            Err(e) => {
                warn!(session = %key, error = %redact_sensitive_data(&e.to_string()), "Conversation turn failed");
                ConversationLog::record(
                    &key.to_string(),
                    ConversationEvent::GatewayFailed {
                        error_msg: e.to_string(),
                    },
                );
                self.reply(event, e.user_message())
            }
        }
    }

    /// One moderated, signed gateway round-trip.
    ///
    /// The session lock is held from reading history until the exchange is
    /// appended, and nothing is appended unless the gateway answered.
    async fn run_turn(
        &self,
        key: &SessionKey,
        text: &str,
        borrowed: Option<Borrowed>,
    ) -> BotResult<String> {
        self.moderation.ensure_allowed(text)?;

        let mut session = self.store.lock(key).await;
        let model_id = self
            .store
            .catalog()
            .resolve_id(session.active_model())
            .await;

        let (borrowed_from, mut messages) = match borrowed {
            Some(b) => (Some(b.from), b.turns),
            None => (None, Vec::new()),
        };
        messages.extend(session.history());
        messages.push(Turn::user(text));

        let request = GatewayRequest {
            model: model_id,
            system_prompt: self.store.system_prompt(&session),
            messages,
            temperature: self.settings.temperature,
        };

        let token = self.signer.issue(&self.settings.identity.user_id)?;
        let reply = timeout(
            self.settings.turn_timeout,
            self.gateway.complete(&request, &token),
        )
        .await
        .map_err(|_| BotError::GatewayTimeout(self.settings.turn_timeout.as_secs()))??;

        if reply.text.trim().is_empty() {
            return Err(BotError::Gateway("empty reply".into()));
        }

        session.push_exchange(text, reply.text.as_str());
        ConversationLog::record(
            &key.to_string(),
            ConversationEvent::TurnCompleted {
                model: session.active_model().to_string(),
                prompt_chars: text.chars().count(),
                reply_chars: reply.text.chars().count(),
                history_len: session.history_len(),
                borrowed_from,
            },
        );
        Ok(reply.text)
    }

    // -----------------------------------------------------------------------
    // Read-only commands
    // -----------------------------------------------------------------------

    async fn list_models(&self, event: &InboundEvent, key: &SessionKey) -> OutboundMessage {
        let session = self.store.get_or_create(key).await;
        let mode = match session.prompt_mode() {
            PromptMode::Persona(p) => format!("persona \"{p}\""),
            PromptMode::Custom(_) => "custom prompt".to_string(),
            PromptMode::Stock => "stock".to_string(),
        };
        let offered = self.store.catalog().offered().await;
        self.reply(
            event,
            format!(
                "Current model: {}\nMode: {mode}\nAvailable models: {}",
                session.active_model(),
                offered.join(", ")
            ),
        )
    }

    async fn help(&self, event: &InboundEvent, sender_name: &str) -> OutboundMessage {
        let text = match &self.settings.help_file {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read help file");
                    return self.reply(event, format!("{sender_name}: {HELP_FILE_ERROR}"));
                }
            },
            None => self.registry.help_text(self.settings.identity.name()),
        };
        let html = render_markdown(&text);
        OutboundMessage::text(&event.room_id, text).with_formatted(html)
    }
}

/// History lent by another user for one `.x` turn.
struct Borrowed {
    from: String,
    turns: Vec<Turn>,
}
