/// Matrix channel adapter for InfiniGPT.
///
/// Uses the Matrix Client-Server HTTP API (v3):
///  - Inbound: `GET /_matrix/client/v3/sync` long-poll loop
///  - Outbound: `PUT /_matrix/client/v3/rooms/{roomId}/send/m.room.message/{txnId}`
///  - Membership: `POST /_matrix/client/v3/join/{roomIdOrAlias}` for configured
///    rooms, on a timer, and for accepted invites
///  - Names: `GET /_matrix/client/v3/profile/{userId}/displayname`, cached
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::ChannelAdapter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use infinigpt_config::defaults::MAX_REJOIN_INTERVAL_SECS;
use infinigpt_config::MatrixConfig;
use infinigpt_core::{BotError, BotResult, ChatTransport, InboundEvent, OutboundMessage};
use infinigpt_logging::redact_sensitive_data;
use infinigpt_security::AccessPolicy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const RETRY_DELAY: Duration = Duration::from_secs(5);
const HTML_FORMAT: &str = "org.matrix.custom.html";

// ---------------------------------------------------------------------------
// Matrix sync wire types (minimal subset)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: Option<SyncRooms>,
}

#[derive(Deserialize, Debug, Default)]
struct SyncRooms {
    #[serde(default)]
    join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    invite: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct JoinedRoom {
    timeline: Option<Timeline>,
}

#[derive(Deserialize, Debug)]
struct Timeline {
    #[serde(default)]
    events: Vec<RoomEvent>,
}

#[derive(Deserialize, Debug)]
struct RoomEvent {
    #[serde(rename = "type")]
    event_type: String,
    sender: Option<String>,
    event_id: Option<String>,
    origin_server_ts: Option<i64>,
    content: Option<serde_json::Value>,
}

#[derive(Serialize, Debug)]
struct SendMessageBody<'a> {
    msgtype: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formatted_body: Option<&'a str>,
}

impl<'a> SendMessageBody<'a> {
    fn from_outbound(message: &'a OutboundMessage) -> Self {
        Self {
            msgtype: "m.text",
            body: &message.body,
            format: message.formatted_body.as_ref().map(|_| HTML_FORMAT),
            formatted_body: message.formatted_body.as_deref(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct DisplayNameResponse {
    displayname: Option<String>,
}

/// `origin_server_ts` is milliseconds since the epoch.
fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn rejoin_period(config: &MatrixConfig) -> Duration {
    Duration::from_secs(config.rejoin_interval_secs.clamp(1, MAX_REJOIN_INTERVAL_SECS))
}

/// Text message → inbound event. Everything else is `None`.
fn to_inbound(room_id: &str, ev: RoomEvent) -> Option<InboundEvent> {
    if ev.event_type != "m.room.message" {
        return None;
    }
    let content = ev.content?;
    if content.get("msgtype").and_then(|v| v.as_str()) != Some("m.text") {
        return None;
    }
    let body = content.get("body").and_then(|v| v.as_str())?.to_string();
    if body.trim().is_empty() {
        return None;
    }

    Some(InboundEvent {
        room_id: room_id.to_string(),
        sender_id: ev.sender?,
        text: body,
        event_id: ev.event_id.unwrap_or_default(),
        origin_ts: ev.origin_server_ts.and_then(timestamp_from_millis),
    })
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct MatrixAdapter {
    config: MatrixConfig,
    access: AccessPolicy,
    http_client: Client,
    display_names: RwLock<HashMap<String, String>>,
    /// Invites we declined; they keep showing up in every `/sync`.
    declined_invites: RwLock<HashSet<String>>,
}

impl MatrixAdapter {
    pub fn new(config: MatrixConfig, access: AccessPolicy) -> Result<Self> {
        // long-poll requests hold the connection for sync_timeout_ms
        let http_timeout = Duration::from_millis(config.sync_timeout_ms) + Duration::from_secs(30);
        let http_client = Client::builder()
            .timeout(http_timeout)
            .build()
            .context("failed to build Matrix HTTP client")?;
        Ok(Self {
            config,
            access,
            http_client,
            display_names: RwLock::new(HashMap::new()),
            declined_invites: RwLock::new(HashSet::new()),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    fn api(&self, path: &str) -> String {
        format!(
            "{}/_matrix/client/v3/{}",
            self.config.homeserver_url.trim_end_matches('/'),
            path
        )
    }

    fn sync_url(&self, since: Option<&str>, timeout_ms: u64) -> String {
        let mut url = self.api(&format!("sync?timeout={timeout_ms}"));
        if let Some(s) = since {
            url.push_str("&since=");
            url.push_str(&urlencoding::encode(s));
        }
        url
    }

    fn send_url(&self, room_id: &str, txn_id: &str) -> String {
        self.api(&format!(
            "rooms/{}/send/m.room.message/{}",
            urlencoding::encode(room_id),
            txn_id
        ))
    }

    fn join_url(&self, room: &str) -> String {
        self.api(&format!("join/{}", urlencoding::encode(room)))
    }

    fn display_name_url(&self, user_id: &str) -> String {
        self.api(&format!("profile/{}/displayname", urlencoding::encode(user_id)))
    }

    async fn sync_once(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncResponse> {
        let res = self
            .http_client
            .get(self.sync_url(since, timeout_ms))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(redact_sensitive_data(&e.without_url().to_string())))?;
        if !res.status().is_success() {
            anyhow::bail!("sync returned {}", res.status());
        }
        res.json::<SyncResponse>()
            .await
            .context("failed to parse sync response")
    }

    /// Long-poll /sync loop. Posts inbound text events to the event bus.
    async fn sync_loop(&self, inbound_tx: &mpsc::Sender<InboundEvent>) -> Result<()> {
        // A first sync with no timeout only yields a token; backlog is skipped.
        let mut since = loop {
            match self.sync_once(None, 0).await {
                Ok(initial) => break initial.next_batch,
                Err(e) => {
                    warn!("[Matrix] Initial sync failed: {:#}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        };

        info!("[Matrix] Starting sync loop");

        loop {
            let sync = match self
                .sync_once(Some(&since), self.config.sync_timeout_ms)
                .await
            {
                Ok(sync) => sync,
                Err(e) => {
                    error!("[Matrix] Sync failed: {:#}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            since = sync.next_batch;

            let Some(rooms) = sync.rooms else {
                continue;
            };
            for room_id in rooms.invite.keys() {
                self.handle_invite(room_id).await;
            }
            for (room_id, room) in rooms.join {
                let Some(timeline) = room.timeline else {
                    continue;
                };
                for ev in timeline.events {
                    let Some(event) = to_inbound(&room_id, ev) else {
                        continue;
                    };
                    if event.sender_id == self.config.user_id {
                        continue;
                    }
                    debug!(room = %event.room_id, sender = %event.sender_id, "[Matrix] Message received");
                    if inbound_tx.send(event).await.is_err() {
                        info!("[Matrix] Event bus closed, stopping sync loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_invite(&self, room_id: &str) {
        if !self.access.should_join(room_id) {
            if self.decline_invite(room_id).await {
                info!(
                    "[Matrix] Ignored invitation to {} (not configured and auto-join is off)",
                    room_id
                );
            }
            return;
        }
        match self.join(room_id).await {
            Ok(()) => info!("[Matrix] Joined {} after invitation", room_id),
            Err(e) => error!("[Matrix] Failed to join {} after invitation: {:#}", room_id, e),
        }
    }

    /// Remember a declined invite. True only the first time a room is declined.
    async fn decline_invite(&self, room_id: &str) -> bool {
        self.declined_invites.write().await.insert(room_id.to_string())
    }

    pub async fn join(&self, room: &str) -> Result<()> {
        let res = self
            .http_client
            .post(self.join_url(room))
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(redact_sensitive_data(&e.without_url().to_string())))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("join returned {}: {}", status, redact_sensitive_data(&body));
        }
        Ok(())
    }

    /// Join every configured room. Failures are logged, not returned.
    pub async fn join_configured_rooms(&self) {
        let mut rooms: Vec<&String> = self.access.channels.iter().collect();
        rooms.sort();
        for room in rooms {
            match self.join(room).await {
                Ok(()) => info!("[Matrix] Joined room {}", room),
                Err(e) => error!("[Matrix] Failed to join room {}: {:#}", room, e),
            }
        }
    }

    async fn rejoin_loop(&self) {
        let period = rejoin_period(&self.config);
        let mut ticker = tokio::time::interval(period);
        // the first tick fires immediately; rooms were just joined on start
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("[Matrix] Re-joining configured rooms");
            self.join_configured_rooms().await;
        }
    }

    async fn fetch_display_name(&self, user_id: &str) -> Result<Option<String>> {
        let res = self
            .http_client
            .get(self.display_name_url(user_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(redact_sensitive_data(&e.without_url().to_string())))?;
        if !res.status().is_success() {
            anyhow::bail!("profile lookup returned {}", res.status());
        }
        let profile: DisplayNameResponse = res.json().await.context("bad profile response")?;
        Ok(profile.displayname.filter(|n| !n.trim().is_empty()))
    }

    pub async fn send_message(&self, message: &OutboundMessage) -> Result<()> {
        let txn_id = Uuid::new_v4().to_string();
        let body = SendMessageBody::from_outbound(message);

        let res = self
            .http_client
            .put(self.send_url(&message.room_id, &txn_id))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(redact_sensitive_data(&e.without_url().to_string())))?;

        if !res.status().is_success() {
            let status = res.status();
            let err = res.text().await.unwrap_or_default();
            anyhow::bail!("send returned {}: {}", status, redact_sensitive_data(&err));
        }
        debug!("[Matrix] Sent message to room {}", message.room_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelAdapter / ChatTransport impls
// ---------------------------------------------------------------------------

#[async_trait]
impl ChannelAdapter for MatrixAdapter {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn start(&self, inbound_tx: mpsc::Sender<InboundEvent>) -> Result<()> {
        info!("[Matrix] Connecting to {}", self.config.homeserver_url);
        self.join_configured_rooms().await;
        tokio::select! {
            result = self.sync_loop(&inbound_tx) => result,
            _ = self.rejoin_loop() => Ok(()),
        }
    }
}

#[async_trait]
impl ChatTransport for MatrixAdapter {
    async fn send(&self, message: &OutboundMessage) -> BotResult<()> {
        self.send_message(message)
            .await
            .map_err(|e| BotError::Transport(format!("{e:#}")))
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        if let Some(name) = self.display_names.read().await.get(user_id) {
            return Some(name.clone());
        }
        match self.fetch_display_name(user_id).await {
            Ok(Some(name)) => {
                self.display_names
                    .write()
                    .await
                    .insert(user_id.to_string(), name.clone());
                Some(name)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("[Matrix] Display name lookup for {} failed: {:#}", user_id, e);
                None
            }
        }
    }
}
