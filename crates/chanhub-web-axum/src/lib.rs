use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::any,
    Router,
};
use bytes::Bytes;
use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::{HandlerRegistry, WebhookResponse};
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
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

fn into_axum_response(response: WebhookResponse) -> axum::response::Response {
    axum::http::Response::builder()
        .status(response.status)
        .header("content-type", response.content_type)
        .body(axum::body::Body::from(response.body))
        .unwrap()
        .into_response()
}

/// Unified handler: `/c/:channel_type/:channel_uuid/:action`, any method.
pub async fn unified_webhook(
    State(state): State<AppState>,
    Path((channel_type, channel_uuid, action)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let generic_headers = to_generic_headers(&headers);
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    let raw = raw_request_from(content_type, &body);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let processor = WebhookProcessor::new(state.backend.clone(), state.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;
    into_axum_response(response)
}

/// Mounts the unified webhook route on an existing router.
pub fn webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/c/{channel_type}/{channel_uuid}/{action}", any(unified_webhook))
        .with_state(state)
}
