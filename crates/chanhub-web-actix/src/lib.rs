//! Actix-web adapter: same unified-dispatch shape as `chanhub-web-axum`,
//! wired to Actix's extractor and service-config idioms instead.

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::{HandlerRegistry, WebhookResponse};
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppData {
    pub backend: Arc<dyn Backend>,
    pub registry: HandlerRegistry,
}

fn to_generic_headers(req: &HttpRequest) -> Headers {
    req.headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn into_actix_response(response: WebhookResponse) -> HttpResponse {
    HttpResponse::build(
        actix_web::http::StatusCode::from_u16(response.status)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
    )
    .content_type(response.content_type)
    .body(response.body)
}

/// Unified handler: `/c/{channel_type}/{channel_uuid}/{action}`, any method.
pub async fn unified_webhook(
    path: web::Path<(String, String, String)>,
    req: HttpRequest,
    body: Bytes,
    data: web::Data<AppData>,
) -> HttpResponse {
    let (channel_type, channel_uuid, action) = path.into_inner();
    let generic_headers = to_generic_headers(&req);
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());
    let raw = raw_request_from(content_type, &body);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let processor = WebhookProcessor::new(data.backend.clone(), data.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;
    into_actix_response(response)
}

/// Mounts the unified webhook route under `/c`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/c/{channel_type}/{channel_uuid}/{action}", web::route().to(unified_webhook));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use chanhub_core::prelude::MockBackend;

    #[actix_web::test]
    async fn webhook_route_compiles() {
        let app_data = AppData {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };

        let _app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_data))
                .configure(configure_routes),
        )
        .await;
    }
}
