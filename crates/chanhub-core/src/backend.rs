//! The narrow collaborator interface the pipeline stages use to reach
//! persistence and the outgoing queue, plus an in-memory double for tests.
//!
//! `Backend` extends `TokenStore` rather than duplicating its two methods:
//! the OAuth cache is just another thing a real backend persists.

use crate::auth::TokenStore;
use crate::error::ChannelError;
use crate::log::ChannelLog;
use crate::model::{Channel, ChannelEvent, MsgIn, MsgOut, Status, StatusTarget, StatusUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait Backend: TokenStore {
    async fn get_channel(&self, channel_type: &str, uuid: Uuid) -> Option<Arc<Channel>>;

    async fn get_channel_by_address(&self, channel_type: &str, address: &str) -> Option<Arc<Channel>>;

    /// Resolves a channel by UUID alone, with no type to check against.
    /// The route-based lookups always have a type in hand from the URL; the
    /// outbound worker only has the UUID carried on a queued `MsgOut`, so it
    /// needs this to find the channel (and, from it, the channel's own
    /// `channel_type`) before it can pick a handler.
    async fn get_channel_by_uuid(&self, uuid: Uuid) -> Option<Arc<Channel>>;

    /// Persists an inbound message. Idempotent on `(channel, external_id)`:
    /// a second call with the same pair returns the id written the first
    /// time rather than writing a duplicate, and records a
    /// `DuplicateIgnored` entry on `log`.
    async fn write_msg(&self, msg: MsgIn, log: &mut ChannelLog) -> Result<Uuid, ChannelError>;

    /// Applies a status transition. Rejects (no-ops) an update that would
    /// regress a message past a terminal state (`D`, `R`, `F`).
    async fn write_status_update(&self, update: StatusUpdate, log: &mut ChannelLog) -> Result<(), ChannelError>;

    async fn write_channel_event(&self, event: ChannelEvent, log: &mut ChannelLog) -> Result<(), ChannelError>;

    /// Persists `log`. Best-effort: a failure here must never fail the
    /// pipeline call that produced it.
    async fn write_channel_log(&self, log: ChannelLog) -> Result<(), ChannelError>;

    async fn pop_next_outgoing_msg(&self) -> Option<MsgOut>;

    async fn mark_outgoing_msg_complete(&self, msg_id: Uuid, update: StatusUpdate);
}

const DEDUP_CAP: usize = 10_000;

struct TokenEntry {
    token: String,
    expires_at: std::time::Instant,
}

/// In-memory `Backend` for tests and examples. Not bounded for production
/// use: `channels`, message bodies and logs grow without eviction; only the
/// dedup index is capped.
pub struct MockBackend {
    channels: dashmap::DashMap<Uuid, Arc<Channel>>,
    dedup: dashmap::DashMap<(Uuid, String), Uuid>,
    dedup_order: tokio::sync::Mutex<std::collections::VecDeque<(Uuid, String)>>,
    statuses: dashmap::DashMap<Uuid, Status>,
    events: tokio::sync::Mutex<Vec<ChannelEvent>>,
    logs: tokio::sync::Mutex<Vec<ChannelLog>>,
    outbox: tokio::sync::Mutex<std::collections::VecDeque<MsgOut>>,
    completed: tokio::sync::Mutex<Vec<(Uuid, StatusUpdate)>>,
    tokens: dashmap::DashMap<String, TokenEntry>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            channels: dashmap::DashMap::new(),
            dedup: dashmap::DashMap::new(),
            dedup_order: tokio::sync::Mutex::new(std::collections::VecDeque::new()),
            statuses: dashmap::DashMap::new(),
            events: tokio::sync::Mutex::new(Vec::new()),
            logs: tokio::sync::Mutex::new(Vec::new()),
            outbox: tokio::sync::Mutex::new(std::collections::VecDeque::new()),
            completed: tokio::sync::Mutex::new(Vec::new()),
            tokens: dashmap::DashMap::new(),
        }
    }

    pub fn register_channel(&self, channel: Channel) {
        self.channels.insert(channel.uuid, Arc::new(channel));
    }

    pub async fn enqueue_outgoing(&self, msg: MsgOut) {
        self.outbox.lock().await.push_back(msg);
    }

    pub async fn logs(&self) -> Vec<ChannelLog> {
        self.logs.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().await.clone()
    }

    pub async fn completed(&self) -> Vec<(Uuid, StatusUpdate)> {
        self.completed.lock().await.clone()
    }

    pub fn status_of(&self, internal_id: Uuid) -> Option<Status> {
        self.statuses.get(&internal_id).map(|s| *s)
    }

    async fn remember_dedup(&self, channel: Uuid, external_id: String, internal_id: Uuid) {
        let key = (channel, external_id);
        self.dedup.insert(key.clone(), internal_id);
        let mut order = self.dedup_order.lock().await;
        order.push_back(key);
        while order.len() > DEDUP_CAP {
            if let Some(oldest) = order.pop_front() {
                self.dedup.remove(&oldest);
            }
        }
    }

    fn resolve_target(&self, channel: Uuid, target: &StatusTarget) -> Option<Uuid> {
        match target {
            StatusTarget::InternalId(id) => Some(*id),
            StatusTarget::ExternalId(external_id) => {
                self.dedup.get(&(channel, external_id.clone())).map(|v| *v)
            }
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_channel(&self, channel_type: &str, uuid: Uuid) -> Option<Arc<Channel>> {
        self.channels
            .get(&uuid)
            .filter(|c| c.channel_type == channel_type)
            .map(|c| c.clone())
    }

    async fn get_channel_by_address(&self, channel_type: &str, address: &str) -> Option<Arc<Channel>> {
        self.channels
            .iter()
            .find(|entry| entry.channel_type == channel_type && entry.address == address)
            .map(|entry| entry.clone())
    }

    async fn get_channel_by_uuid(&self, uuid: Uuid) -> Option<Arc<Channel>> {
        self.channels.get(&uuid).map(|c| c.clone())
    }

    async fn write_msg(&self, msg: MsgIn, log: &mut ChannelLog) -> Result<Uuid, ChannelError> {
        if !msg.external_id.is_empty() {
            let key = (msg.channel, msg.external_id.clone());
            if let Some(existing) = self.dedup.get(&key) {
                log.push_error(crate::log::LogError {
                    code: "duplicate-ignored".to_string(),
                    external_code: None,
                    message: format!("duplicate external id {}", msg.external_id),
                });
                return Ok(*existing);
            }
        }

        let id = Uuid::new_v4();
        if !msg.external_id.is_empty() {
            self.remember_dedup(msg.channel, msg.external_id.clone(), id).await;
        }
        self.statuses.insert(id, Status::Pending);
        Ok(id)
    }

    async fn write_status_update(&self, update: StatusUpdate, log: &mut ChannelLog) -> Result<(), ChannelError> {
        let Some(internal_id) = self.resolve_target(update.channel, &update.target) else {
            log.push_error(crate::log::LogError {
                code: "status-target-unresolved".to_string(),
                external_code: None,
                message: "no message found for status target".to_string(),
            });
            return Ok(());
        };

        if let Some(current) = self.statuses.get(&internal_id).map(|s| *s) {
            if !current.regress_allowed_from(update.status) {
                return Ok(());
            }
        }

        self.statuses.insert(internal_id, update.status);
        if let Some(new_external_id) = &update.new_external_id {
            self.remember_dedup(update.channel, new_external_id.clone(), internal_id).await;
        }
        Ok(())
    }

    async fn write_channel_event(&self, event: ChannelEvent, _log: &mut ChannelLog) -> Result<(), ChannelError> {
        self.events.lock().await.push(event);
        Ok(())
    }

    async fn write_channel_log(&self, log: ChannelLog) -> Result<(), ChannelError> {
        self.logs.lock().await.push(log);
        Ok(())
    }

    async fn pop_next_outgoing_msg(&self) -> Option<MsgOut> {
        self.outbox.lock().await.pop_front()
    }

    async fn mark_outgoing_msg_complete(&self, msg_id: Uuid, update: StatusUpdate) {
        self.statuses.insert(msg_id, update.status);
        self.completed.lock().await.push((msg_id, update));
    }
}

#[async_trait]
impl TokenStore for MockBackend {
    async fn token_cache_get(&self, key: &str) -> Option<String> {
        let entry = self.tokens.get(key)?;
        if entry.expires_at <= std::time::Instant::now() {
            drop(entry);
            self.tokens.remove(key);
            return None;
        }
        Some(entry.token.clone())
    }

    async fn token_cache_set(&self, key: &str, token: &str, ttl: std::time::Duration) {
        self.tokens.insert(
            key.to_string(),
            TokenEntry {
                token: token.to_string(),
                expires_at: std::time::Instant::now() + ttl,
            },
        );
    }
}
