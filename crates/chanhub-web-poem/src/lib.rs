//! Poem adapter: same unified-dispatch shape as `chanhub-web-axum`, wired to
//! Poem's extractor conventions.

use bytes::Bytes;
use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use poem::{
    http::HeaderMap,
    web::{Data, Path},
    Request, Response, Result,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub registry: HandlerRegistry,
}

fn to_generic_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn into_poem_response(response: chanhub_pipeline::prelude::WebhookResponse) -> Response {
    Response::builder()
        .status(
            poem::http::StatusCode::from_u16(response.status)
                .unwrap_or(poem::http::StatusCode::INTERNAL_SERVER_ERROR),
        )
        .header("content-type", response.content_type)
        .body(response.body)
}

/// Unified handler: `/c/:channel_type/:channel_uuid/:action`, any method.
#[poem::handler]
pub async fn unified_webhook(
    req: &Request,
    Path((channel_type, channel_uuid, action)): Path<(String, String, String)>,
    body: Bytes,
    Data(state): Data<&AppState>,
) -> Result<Response> {
    let generic_headers = to_generic_headers(req.headers());
    let content_type = req.headers().get("content-type").and_then(|v| v.to_str().ok());
    let raw = raw_request_from(content_type, &body);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let processor = WebhookProcessor::new(state.backend.clone(), state.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;
    Ok(into_poem_response(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanhub_core::prelude::MockBackend;

    #[test]
    fn poem_types_compile() {
        let _state = AppState {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };
    }
}
