//! Registry of all conversation sessions, keyed by (room, user).

use std::collections::HashMap;
use std::sync::Arc;

use infinigpt_config::BotConfig;
use infinigpt_core::{BotResult, Role, SessionKey, Turn};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::models::ModelCatalog;
use crate::state::{PersonaFraming, SessionDefaults, SessionState};

/// Exclusive access to one session for the length of a conversation turn.
pub type SessionGuard = OwnedMutexGuard<SessionState>;

/// Owns every session.
///
/// Each session sits behind its own mutex, so turns for different keys run in
/// parallel while mutations of a single key are serialized. The outer map lock
/// is only held to look up or insert an entry, never across an await on a
/// session.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<SessionState>>>>,
    defaults: SessionDefaults,
    framing: PersonaFraming,
    catalog: ModelCatalog,
}

impl ConversationStore {
    pub fn new(defaults: SessionDefaults, framing: PersonaFraming, catalog: ModelCatalog) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
            framing,
            catalog,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        let catalog = ModelCatalog::from_config(&config.models);
        let defaults = SessionDefaults {
            persona: config.persona.default.clone(),
            model: catalog.default_model().to_string(),
            max_turns: config.history.max_turns,
        };
        let framing = PersonaFraming {
            prefix: config.persona.prefix.clone(),
            suffix: config.persona.suffix.clone(),
        };
        Self::new(defaults, framing, catalog)
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// System prompt for a session given this store's persona framing.
    pub fn system_prompt(&self, state: &SessionState) -> Option<String> {
        state.system_prompt(&self.framing)
    }

    async fn entry(&self, key: &SessionKey) -> Arc<Mutex<SessionState>> {
        if let Some(existing) = self.sessions.read().await.get(key) {
            return Arc::clone(existing);
        }
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(key.clone()).or_insert_with(|| {
            debug!(session = %key, "Creating session");
            Arc::new(Mutex::new(SessionState::new(&self.defaults)))
        });
        Arc::clone(entry)
    }

    /// Lock a session (creating it if needed) until the guard is dropped.
    pub async fn lock(&self, key: &SessionKey) -> SessionGuard {
        self.entry(key).await.lock_owned().await
    }

    /// Snapshot of the session, creating it from defaults on first use.
    pub async fn get_or_create(&self, key: &SessionKey) -> SessionState {
        self.lock(key).await.clone()
    }

    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    pub async fn set_persona(&self, key: &SessionKey, persona: &str) {
        self.lock(key).await.set_persona(persona);
    }

    pub async fn set_custom_prompt(&self, key: &SessionKey, prompt: &str) {
        self.lock(key).await.set_custom_prompt(prompt);
    }

    pub async fn reset(&self, key: &SessionKey) {
        self.lock(key).await.reset(&self.defaults);
    }

    pub async fn to_stock(&self, key: &SessionKey) {
        self.lock(key).await.to_stock();
    }

    /// Switch the session's model. Returns the model now active.
    pub async fn set_model(&self, key: &SessionKey, name: &str) -> BotResult<String> {
        let model = self.catalog.validate(name)?;
        self.lock(key).await.set_model(model.clone());
        Ok(model)
    }

    pub async fn append_turn(&self, key: &SessionKey, role: Role, text: &str) {
        self.lock(key).await.push_turn(role, text);
    }

    /// History of a session without creating it. Unknown keys read as empty.
    pub async fn read_history(&self, key: &SessionKey) -> Vec<Turn> {
        let entry = self.sessions.read().await.get(key).cloned();
        match entry {
            Some(session) => session.lock().await.history(),
            None => Vec::new(),
        }
    }

    /// Users with a session in `room_id`, sorted.
    pub async fn users_in_room(&self, room_id: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .sessions
            .read()
            .await
            .keys()
            .filter(|k| k.room_id == room_id)
            .map(|k| k.user_id.clone())
            .collect();
        users.sort();
        users
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infinigpt_core::BotError;

    fn store(cap: usize) -> ConversationStore {
        ConversationStore::new(
            SessionDefaults {
                persona: Some("a helpful cat".into()),
                model: "gpt-x".into(),
                max_turns: cap,
            },
            PersonaFraming {
                prefix: "be ".into(),
                suffix: ".".into(),
            },
            ModelCatalog::new(vec!["gpt-x".into(), "gpt-y".into()], true, "gpt-x"),
        )
    }

    fn key(room: &str, user: &str) -> SessionKey {
        SessionKey::new(room, user)
    }

    #[tokio::test]
    async fn first_access_uses_defaults() {
        let store = store(24);
        let s = store.get_or_create(&key("!r", "@a")).await;
        assert_eq!(s.active_persona(), Some("a helpful cat"));
        assert_eq!(s.active_model(), "gpt-x");
        assert_eq!(store.system_prompt(&s).as_deref(), Some("be a helpful cat."));
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_room_and_user() {
        let store = store(24);
        let a = key("!r1", "@alice");
        store.append_turn(&a, Role::User, "hi").await;
        store.set_persona(&a, "a pirate").await;

        for other in [key("!r1", "@bob"), key("!r2", "@alice")] {
            let s = store.get_or_create(&other).await;
            assert_eq!(s.history_len(), 0);
            assert_eq!(s.active_persona(), Some("a helpful cat"));
        }
        assert_eq!(store.read_history(&a).await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_model_leaves_session_unchanged() {
        let store = store(24);
        let k = key("!r", "@a");
        store.set_model(&k, "gpt-y").await.unwrap();
        let err = store.set_model(&k, "bogus").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidModel { .. }));
        assert_eq!(store.get_or_create(&k).await.active_model(), "gpt-y");

        assert_eq!(store.set_model(&k, "reset").await.unwrap(), "gpt-x");
    }

    #[tokio::test]
    async fn read_history_does_not_create_sessions() {
        let store = store(24);
        assert!(store.read_history(&key("!r", "@ghost")).await.is_empty());
        assert!(!store.contains(&key("!r", "@ghost")).await);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn history_cap_holds_under_appends() {
        let store = store(6);
        let k = key("!r", "@a");
        for i in 0..20 {
            store.append_turn(&k, Role::User, &format!("q{i}")).await;
            store.append_turn(&k, Role::Assistant, &format!("a{i}")).await;
            assert!(store.read_history(&k).await.len() <= 6);
        }
        let last = store.read_history(&k).await;
        assert_eq!(last.first().map(|t| t.text.as_str()), Some("q17"));
        assert_eq!(last.last().map(|t| t.text.as_str()), Some("a19"));
    }

    #[tokio::test]
    async fn users_in_room_lists_only_that_room() {
        let store = store(24);
        store.get_or_create(&key("!r1", "@bob")).await;
        store.get_or_create(&key("!r1", "@alice")).await;
        store.get_or_create(&key("!r2", "@carol")).await;
        assert_eq!(store.users_in_room("!r1").await, vec!["@alice", "@bob"]);
    }

    #[tokio::test]
    async fn concurrent_appends_on_one_key_are_not_lost() {
        let store = Arc::new(store(1000));
        let k = key("!r", "@a");
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = store.lock(&k).await;
                tokio::task::yield_now().await;
                guard.push_exchange(format!("q{i}"), format!("a{i}"));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let history = store.read_history(&k).await;
        assert_eq!(history.len(), 100);
        // exchanges are never interleaved
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].text[1..], pair[1].text[1..]);
        }
    }
}
