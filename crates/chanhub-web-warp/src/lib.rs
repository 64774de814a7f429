//! Warp adapter: same unified-dispatch shape as `chanhub-web-axum`, wired to
//! Warp's filter-combinator conventions.

use bytes::Bytes;
use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use std::sync::Arc;
use warp::{http::HeaderMap, hyper::StatusCode, Filter, Rejection, Reply};

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

/// Unified handler: `/c/:channel_type/:channel_uuid/:action`, any method.
pub async fn unified_webhook_handler(
    channel_type: String,
    channel_uuid: String,
    action: String,
    headers: HeaderMap,
    body: Bytes,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
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

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok(warp::reply::with_status(
        warp::reply::with_header(response.body, "content-type", response.content_type),
        status,
    )
    .into_response())
}

/// Builds a filter mounting the unified webhook route under `/c`.
pub fn webhook_filter(
    state: AppState,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    warp::path!("c" / String / String / String)
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(warp::any().map(move || state.clone()))
        .and_then(unified_webhook_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanhub_core::prelude::MockBackend;

    #[tokio::test]
    async fn webhook_filter_compiles() {
        let state = AppState {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };
        let _filter = webhook_filter(state);
    }
}
