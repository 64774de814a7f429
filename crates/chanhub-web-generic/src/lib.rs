//! Framework-agnostic webhook dispatch shared by every HTTP adapter: each
//! adapter extracts routing coordinates and raw bytes from its own request
//! type, then hands them to `WebhookProcessor`, which resolves the channel
//! UUID and runs the real pipeline.

use chanhub_core::prelude::{Backend, RawRequest};
use chanhub_pipeline::prelude::{handle_webhook, HandlerRegistry, WebhookRequest, WebhookResponse};
use std::sync::Arc;
use uuid::Uuid;

pub type Headers = Vec<(String, String)>;

fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Builds the `RawRequest` variant for an inbound body from its declared
/// content type. None of the shipped provider adapters decode a GET query
/// string on receive/status actions, so this only distinguishes JSON from
/// URL-encoded form bodies, falling back to form.
pub fn raw_request_from(content_type: Option<&str>, body: &[u8]) -> RawRequest {
    match content_type {
        Some(ct) if ct.starts_with("application/json") => RawRequest::Json(body.to_vec()),
        _ => RawRequest::Form(String::from_utf8_lossy(body).into_owned()),
    }
}

/// Reconstructs the canonical request URL from `X-Forwarded-Proto`/`Host`
/// headers (defaulting to `https`/`localhost`), the way a reverse-proxy
/// deployment would present it to the signature check.
pub fn build_request_url(headers: &Headers, path_and_query: &str) -> String {
    let scheme = header(headers, "x-forwarded-proto").unwrap_or("https");
    let host = header(headers, "host").unwrap_or("localhost");
    format!("{scheme}://{host}{path_and_query}")
}

#[derive(Clone)]
pub struct WebhookProcessor {
    backend: Arc<dyn Backend>,
    registry: HandlerRegistry,
}

impl WebhookProcessor {
    pub fn new(backend: Arc<dyn Backend>, registry: HandlerRegistry) -> Self {
        Self { backend, registry }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn process(
        &self,
        channel_type: &str,
        channel_uuid: &str,
        action: &str,
        request_url: &str,
        headers: &Headers,
        raw: RawRequest,
    ) -> WebhookResponse {
        let Ok(channel_uuid) = Uuid::parse_str(channel_uuid) else {
            return WebhookResponse::plain(404, "not found");
        };
        let req = WebhookRequest {
            channel_type: channel_type.to_string(),
            channel_uuid,
            action: action.to_string(),
            request_url: request_url.to_string(),
            forwarded_path: header(headers, "x-forwarded-path").map(|s| s.to_string()),
            signature_header: header(headers, "x-twilio-signature").map(|s| s.to_string()),
            raw,
        };
        handle_webhook(self.backend.as_ref(), &self.registry, req).await
    }
}
