//! The polymorphic surface every provider adapter implements, and the
//! registry that resolves a channel-type tag to one.

use async_trait::async_trait;
use chanhub_core::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One route a handler wants mounted, e.g. `("POST", "receive")` at
/// `/c/<type>/<uuid>/receive`.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub method: &'static str,
    pub action: &'static str,
}

/// The literal HTTP body (and status/content-type) an adapter hook produces.
/// Exists so that adapters can return exact provider-required literals
/// (Twilio's XML stub, Macrokiosk's `-1`, M3Tech's `SMS Accepted: <id>`)
/// without the pipeline guessing a shape.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl WebhookResponse {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn plain(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/plain", body)
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "application/json", body)
    }
}

/// The normalized result of decoding an inbound `receive` webhook, prior to
/// Backend persistence.
pub struct ReceivedMsg {
    pub msg: MsgIn,
    pub events: Vec<ChannelEvent>,
}

/// The normalized result of decoding an inbound `status` webhook.
pub enum StatusOutcome {
    /// The report carried no usable identifier, or an unrecognized status
    /// code the adapter chooses to swallow rather than reject.
    Ignored { response: WebhookResponse },
    Update {
        target: StatusTarget,
        status: Status,
        new_external_id: Option<String>,
        urn_update: Option<Urn>,
        error: Option<LogError>,
        stop_event: Option<ChannelEvent>,
        response: WebhookResponse,
    },
}

/// Everything a `send` call needs beyond the canonical `MsgOut` itself.
pub struct SendContext<'a> {
    pub http: &'a reqwest::Client,
    pub cancel: &'a tokio_util::sync::CancellationToken,
}

#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Short channel-type tag, e.g. `"t"` for Twilio. Route-matched
    /// case-insensitively; the registry stores it lowercased.
    fn channel_type(&self) -> &'static str;

    fn channel_name(&self) -> &'static str;

    fn routes(&self) -> &'static [RouteSpec];

    /// Secret values pulled from `channel.config` that must be redacted from
    /// any log produced by this invocation.
    fn redact_values(&self, channel: &Channel) -> Vec<String>;

    /// Whether `action` requires signature validation before decoding.
    fn requires_signature(&self, _action: &str) -> bool {
        false
    }

    /// Verifies the adapter's signature scheme over the raw request.
    /// Only called when `requires_signature` returns true for the action.
    /// `forwarded_path`, when present, replaces the request URL's path
    /// component before the canonical string is built (reverse-proxy
    /// deployments behind a path-rewriting load balancer).
    fn verify_signature(
        &self,
        _channel: &Channel,
        _request_url: &str,
        _forwarded_path: Option<&str>,
        _raw: &RawRequest,
        _signature_header: Option<&str>,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn decode_receive(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        log: &mut ChannelLog,
    ) -> Result<ReceivedMsg, ChannelError>;

    fn write_msg_success_response(&self, internal_id: Uuid) -> WebhookResponse;

    async fn decode_status(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError>;

    async fn send(
        &self,
        ctx: &SendContext<'_>,
        channel: &Channel,
        msg: &MsgOut,
        log: &mut ChannelLog,
    ) -> StatusUpdate;
}

/// Resolves a lowercased channel-type tag to its handler. Generalizes the
/// teacher's single-field-per-provider registry to the full handler
/// contract: registration is still a flat map from tag to trait object,
/// just a richer trait.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<String, Arc<dyn ChannelHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(HashMap::new()),
        }
    }

    pub fn with(mut self, handler: Arc<dyn ChannelHandler>) -> Self {
        let mut map = (*self.handlers).clone();
        map.insert(handler.channel_type().to_lowercase(), handler);
        self.handlers = Arc::new(map);
        self
    }

    pub fn get(&self, channel_type: &str) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(&channel_type.to_lowercase()).cloned()
    }
}
