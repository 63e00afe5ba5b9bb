//! Per-room event dispatch.
//!
//! Each room gets a worker task fed through its own queue, so events within a
//! room are handled strictly in arrival order while rooms proceed
//! independently. A slow gateway call in one room never delays another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use infinigpt_core::InboundEvent;

use crate::router::CommandRouter;

type RoomSender = mpsc::UnboundedSender<InboundEvent>;

pub struct RoomDispatcher {
    router: Arc<CommandRouter>,
    workers: HashMap<String, RoomSender>,
    tasks: JoinSet<()>,
}

impl RoomDispatcher {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self {
            router,
            workers: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Consume the inbound bus until every sender is gone, then let each room
    /// finish its queued events.
    pub async fn run(mut self, mut rx: mpsc::Receiver<InboundEvent>) {
        info!("Room dispatcher started");
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        info!(rooms = self.workers.len(), "Inbound bus closed, draining room queues");
        self.workers.clear();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Room worker ended abnormally");
            }
        }
    }

    fn dispatch(&mut self, event: InboundEvent) {
        let event = match self.workers.get(&event.room_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // worker died; start a fresh one below
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let room_id = event.room_id.clone();
        let tx = self.spawn_worker(&room_id);
        if tx.send(event).is_err() {
            warn!(room = %room_id, "Room worker rejected its first event");
        }
        self.workers.insert(room_id, tx);
    }

    fn spawn_worker(&mut self, room_id: &str) -> RoomSender {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let router = Arc::clone(&self.router);
        let room = room_id.to_string();
        debug!(room = %room, "Starting room worker");
        self.tasks.spawn(async move {
            while let Some(event) = rx.recv().await {
                router.process(&event).await;
            }
            debug!(room = %room, "Room worker stopped");
        });
        tx
    }

    pub fn active_rooms(&self) -> usize {
        self.workers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use infinigpt_core::{
        BotResult, ChatTransport, EventBus, GatewayClient, GatewayReply, GatewayRequest,
        ModelInfo, OutboundMessage, SessionKey,
    };
    use infinigpt_security::RequestSigner;
    use infinigpt_session::{ConversationStore, ModelCatalog, PersonaFraming, SessionDefaults};
    use tokio::sync::Mutex;

    use crate::detection::BotIdentity;
    use crate::router::RouterSettings;

    /// Sleeps longer for messages containing "slow".
    struct SlowGateway;

    #[async_trait]
    impl GatewayClient for SlowGateway {
        async fn complete(&self, request: &GatewayRequest, _token: &str) -> BotResult<GatewayReply> {
            let text = request.messages.last().map(|t| t.text.clone()).unwrap_or_default();
            let delay = if text.contains("slow") { 200 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(GatewayReply { text: format!("re {text}") })
        }

        async fn list_models(&self, _token: &str) -> BotResult<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl ChatTransport for Recorder {
        async fn send(&self, message: &OutboundMessage) -> BotResult<()> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }

        async fn display_name(&self, _user_id: &str) -> Option<String> {
            None
        }
    }

    struct Signer;

    impl RequestSigner for Signer {
        fn issue(&self, _subject: &str) -> BotResult<String> {
            Ok("t".into())
        }
    }

    fn router(transport: Arc<Recorder>) -> Arc<CommandRouter> {
        let store = Arc::new(ConversationStore::new(
            SessionDefaults {
                persona: None,
                model: "m".into(),
                max_turns: 100,
            },
            PersonaFraming::default(),
            ModelCatalog::new(vec![], false, "m"),
        ));
        let mut settings = RouterSettings::new(BotIdentity::new("@bot:x"));
        settings.turn_timeout = Duration::from_secs(5);
        Arc::new(CommandRouter::new(
            store,
            Arc::new(SlowGateway),
            transport,
            Arc::new(Signer),
            settings,
        ))
    }

    #[tokio::test]
    async fn room_events_stay_ordered_and_rooms_run_concurrently() {
        let transport = Arc::new(Recorder::default());
        let router = router(transport.clone());
        let mut bus = EventBus::new();
        let rx = bus.take_inbound_rx().unwrap();
        let dispatcher = RoomDispatcher::new(router.clone());
        let handle = tokio::spawn(dispatcher.run(rx));

        let tx = bus.inbound_tx.clone();
        tx.send(InboundEvent::new("!a:x", "@u:x", ".ai slow one")).await.unwrap();
        tx.send(InboundEvent::new("!a:x", "@u:x", ".ai two")).await.unwrap();
        tx.send(InboundEvent::new("!b:x", "@u:x", ".ai fast")).await.unwrap();
        drop(tx);
        drop(bus);
        handle.await.unwrap();

        let sent = transport.sent.lock().await;
        let bodies: Vec<_> = sent.iter().map(|m| m.body.as_str()).collect();
        // room b did not wait behind room a's slow turn
        assert_eq!(bodies[0], "@u:x:\n\nre fast");
        let a: Vec<_> = bodies.iter().filter(|b| !b.ends_with("fast")).collect();
        assert_eq!(a, vec![&"@u:x:\n\nre slow one", &"@u:x:\n\nre two"]);

        let history = router
            .store()
            .read_history(&SessionKey::new("!a:x", "@u:x"))
            .await;
        let texts: Vec<_> = history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["slow one", "re slow one", "two", "re two"]);
    }

    #[tokio::test]
    async fn one_worker_per_room() {
        let transport = Arc::new(Recorder::default());
        let mut dispatcher = RoomDispatcher::new(router(transport));
        dispatcher.dispatch(InboundEvent::new("!a:x", "@u:x", "hello"));
        dispatcher.dispatch(InboundEvent::new("!a:x", "@v:x", "hello"));
        dispatcher.dispatch(InboundEvent::new("!b:x", "@u:x", "hello"));
        assert_eq!(dispatcher.active_rooms(), 2);
    }
}
