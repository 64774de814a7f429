//! Canonical error kinds, one per row of the failure taxonomy every pipeline shares.

use uuid::Uuid;

/// A classified failure inside the handler framework.
///
/// Decode/signature/URN variants short-circuit the inbound pipeline with an
/// HTTP response; every other variant is accumulated on the `ChannelLog` and
/// surfaced through the returned `StatusUpdate`/`ChannelEvent`s instead of
/// ever crossing the HTTP boundary as an `Err`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {channel}: missing required config key '{key}'")]
    ChannelConfig { channel: Uuid, key: String },

    #[error("request invalid: {field}")]
    RequestInvalid { field: String },

    #[error("invalid request signature")]
    SignatureInvalid,

    #[error("missing request signature")]
    SignatureMissing,

    #[error("invalid urn: {reason}")]
    UrnInvalid { reason: String },

    #[error("duplicate message ignored")]
    DuplicateIgnored,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("unexpected response status {status}: {body}")]
    ResponseStatus { status: u16, body: String },

    #[error("response value missing: {field}")]
    ResponseValueMissing { field: String },

    #[error("provider error {code}: {message}")]
    ExternalError { code: String, message: String },

    #[error("contact stopped")]
    ContactStopped,

    #[error("throttled, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    #[error("backend error: {0}")]
    Backend(String),
}

impl ChannelError {
    /// HTTP status the inbound pipeline should write for a short-circuiting error.
    pub fn http_status(&self) -> u16 {
        match self {
            ChannelError::ChannelConfig { .. } => 400,
            ChannelError::RequestInvalid { .. } => 400,
            ChannelError::SignatureInvalid | ChannelError::SignatureMissing => 400,
            ChannelError::UrnInvalid { .. } => 400,
            ChannelError::DuplicateIgnored => 200,
            _ => 500,
        }
    }

    /// Whether this failure is retryable by the outbound queue machinery.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ChannelError::ConnectionFailed(_) | ChannelError::Throttled { .. }
        )
    }
}
