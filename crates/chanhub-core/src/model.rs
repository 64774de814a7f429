//! Canonical data model shared by every pipeline stage and provider adapter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// A configured provider endpoint.
///
/// Immutable within a request: the inbound and outbound pipelines only ever
/// read from a `Channel`, they never mutate one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub uuid: Uuid,
    /// Short channel-type tag, e.g. "T" (Twilio), "CT" (Clickatell), "NX" (Nexmo).
    pub channel_type: String,
    /// Canonical address (phone number or short code) this channel sends from.
    pub address: String,
    /// ISO-3166-1 alpha-2 country code, used as the default URN country hint.
    pub country: String,
    pub schemes: Vec<UrnScheme>,
    pub config: HashMap<String, serde_json::Value>,
    pub role: ChannelRole,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChannelRole: u8 {
        const RECEIVE = 0b01;
        const SEND = 0b10;
    }
}

impl Channel {
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    pub fn config_str_required(&self, key: &str) -> Result<&str, crate::error::ChannelError> {
        self.config_str(key)
            .ok_or_else(|| crate::error::ChannelError::ChannelConfig {
                channel: self.uuid,
                key: key.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrnScheme {
    Tel,
    Whatsapp,
    Wechat,
    Facebook,
    Telegram,
}

impl UrnScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrnScheme::Tel => "tel",
            UrnScheme::Whatsapp => "whatsapp",
            UrnScheme::Wechat => "wechat",
            UrnScheme::Facebook => "facebook",
            UrnScheme::Telegram => "telegram",
        }
    }
}

impl std::str::FromStr for UrnScheme {
    type Err = crate::error::ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tel" => Ok(UrnScheme::Tel),
            "whatsapp" => Ok(UrnScheme::Whatsapp),
            "wechat" => Ok(UrnScheme::Wechat),
            "facebook" => Ok(UrnScheme::Facebook),
            "telegram" => Ok(UrnScheme::Telegram),
            other => Err(crate::error::ChannelError::UrnInvalid {
                reason: format!("unknown scheme: {other}"),
            }),
        }
    }
}

/// `scheme:path` identifier for a remote party. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Urn {
    pub scheme: UrnScheme,
    pub path: String,
}

impl Urn {
    pub fn new(scheme: UrnScheme, path: impl Into<String>) -> Self {
        Self {
            scheme,
            path: path.into(),
        }
    }

    pub fn tel(e164: impl Into<String>) -> Self {
        Self::new(UrnScheme::Tel, e164)
    }
}

impl std::fmt::Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme.as_str(), self.path)
    }
}

/// Inbound message normalized from a provider webhook, prior to Backend persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgIn {
    pub channel: Uuid,
    pub urn: Urn,
    pub text: String,
    pub attachments: Vec<String>,
    /// Provider's own message id. Empty string means the provider gave none.
    pub external_id: String,
    pub received_on: OffsetDateTime,
    pub contact_name: Option<String>,
}

impl MsgIn {
    pub fn new(channel: Uuid, urn: Urn, text: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            channel,
            urn,
            text: text.into(),
            attachments: Vec::new(),
            external_id: external_id.into(),
            received_on: OffsetDateTime::now_utc(),
            contact_name: None,
        }
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(url.into());
        self
    }

    pub fn with_contact_name(mut self, name: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self
    }

    pub fn with_received_on(mut self, received_on: OffsetDateTime) -> Self {
        self.received_on = received_on;
        self
    }
}

/// An attachment pairs a MIME content type with a URL, e.g. `"image/jpeg:https://..."`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub content_type: String,
    pub url: String,
}

impl Attachment {
    pub fn parse(raw: &str) -> Option<Self> {
        let (content_type, url) = raw.split_once(':')?;
        Some(Self {
            content_type: content_type.to_string(),
            url: url.to_string(),
        })
    }
}

impl std::fmt::Display for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.url)
    }
}

/// Canonical outbound message, an immutable input to the outbound pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgOut {
    pub id: Uuid,
    pub channel: Uuid,
    pub urn: Urn,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub quick_replies: Vec<String>,
    pub locale: Option<String>,
    pub high_priority: bool,
    pub response_to_external_id: Option<String>,
}

/// Canonical status lattice: P -> Q -> W -> {S} -> {D|R|F}, with E a retryable sidetrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Queued,
    Wired,
    Sent,
    Delivered,
    Read,
    Errored,
    Failed,
}

impl Status {
    pub fn code(&self) -> char {
        match self {
            Status::Pending => 'P',
            Status::Queued => 'Q',
            Status::Wired => 'W',
            Status::Sent => 'S',
            Status::Delivered => 'D',
            Status::Read => 'R',
            Status::Errored => 'E',
            Status::Failed => 'F',
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Delivered | Status::Read | Status::Failed)
    }

    /// Whether a status update may move a message currently at `self` to `to`.
    /// Once a message reaches a terminal state, only a repeat of that same
    /// state is accepted; every other status is a no-op regression.
    pub fn regress_allowed_from(&self, to: Status) -> bool {
        !self.is_terminal() || self.code() == to.code()
    }
}

/// An update to a message's delivery status, addressed by internal id or external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub channel: Uuid,
    pub target: StatusTarget,
    pub status: Status,
    pub created_on: OffsetDateTime,
    pub new_external_id: Option<String>,
    pub urn_update: Option<Urn>,
}

impl StatusUpdate {
    pub fn for_internal_id(channel: Uuid, id: Uuid, status: Status) -> Self {
        Self {
            channel,
            target: StatusTarget::InternalId(id),
            status,
            created_on: OffsetDateTime::now_utc(),
            new_external_id: None,
            urn_update: None,
        }
    }

    pub fn for_external_id(channel: Uuid, external_id: impl Into<String>, status: Status) -> Self {
        Self {
            channel,
            target: StatusTarget::ExternalId(external_id.into()),
            status,
            created_on: OffsetDateTime::now_utc(),
            new_external_id: None,
            urn_update: None,
        }
    }

    pub fn with_new_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.new_external_id = Some(external_id.into());
        self
    }

    pub fn with_urn_update(mut self, urn: Urn) -> Self {
        self.urn_update = Some(urn);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusTarget {
    InternalId(Uuid),
    ExternalId(String),
}

/// A synthetic platform-level event surfaced alongside ordinary message flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: Uuid,
    pub urn: Urn,
    pub event_type: ChannelEventType,
    pub extra: HashMap<String, serde_json::Value>,
    pub contact_name: Option<String>,
    pub urn_auth_tokens: Vec<String>,
    pub occurred_on: OffsetDateTime,
}

impl ChannelEvent {
    pub fn new(channel: Uuid, urn: Urn, event_type: ChannelEventType) -> Self {
        Self {
            channel,
            urn,
            event_type,
            extra: HashMap::new(),
            contact_name: None,
            urn_auth_tokens: Vec::new(),
            occurred_on: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_contact_name(mut self, name: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelEventType {
    NewConversation,
    Referral,
    StopContact,
    Welcome,
    OptIn,
    OptOut,
}
