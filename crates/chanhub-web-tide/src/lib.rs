//! Tide adapter: same unified-dispatch shape as `chanhub-web-axum`, wired to
//! Tide's state-carrying `Request` and route-table conventions.

use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use std::sync::Arc;
use tide::{Request, Response, Result, StatusCode};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub registry: HandlerRegistry,
}

fn to_generic_headers(req: &Request<AppState>) -> Headers {
    req.iter()
        .map(|(name, values)| {
            let value = values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ");
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Unified handler: `/c/:channel_type/:channel_uuid/:action`, any method.
pub async fn unified_webhook(mut req: Request<AppState>) -> Result<Response> {
    let channel_type = req.param("channel_type")?.to_string();
    let channel_uuid = req.param("channel_uuid")?.to_string();
    let action = req.param("action")?.to_string();

    let generic_headers = to_generic_headers(&req);
    let content_type = req.content_type().map(|m| m.to_string());
    let body = req.body_bytes().await?;
    let raw = raw_request_from(content_type.as_deref(), &body);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let state = req.state();
    let processor = WebhookProcessor::new(state.backend.clone(), state.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;

    let status = StatusCode::try_from(response.status).unwrap_or(StatusCode::InternalServerError);
    let mut res = Response::new(status);
    res.set_body(response.body);
    let content_type = if response.content_type == "application/json" {
        tide::http::mime::JSON
    } else {
        tide::http::mime::PLAIN
    };
    res.set_content_type(content_type);
    Ok(res)
}

/// Mounts the unified webhook route under `/c`, for every HTTP method.
pub fn configure_routes(app: &mut tide::Server<AppState>) {
    app.at("/c/:channel_type/:channel_uuid/:action").all(unified_webhook);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanhub_core::prelude::MockBackend;

    #[test]
    fn tide_routes_configure() {
        let state = AppState {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };
        let mut app = tide::with_state(state);
        configure_routes(&mut app);
    }
}
