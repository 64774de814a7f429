//! Raw Hyper adapter: no router, so this one parses `/c/<type>/<uuid>/<action>`
//! itself before handing off to the same `WebhookProcessor` the framework
//! adapters share.

use bytes::Bytes;
use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use http_body_util::{BodyExt, Full};
use hyper::{HeaderMap, Request, Response, StatusCode, Uri};
use std::convert::Infallible;
use std::sync::Arc;

type HyperServiceFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send>,
>;

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

fn plain_response(status: StatusCode, content_type: &'static str, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Splits `/c/<type>/<uuid>/<action>` into its three routing coordinates.
fn extract_route(uri: &Uri) -> Option<(String, String, String)> {
    let path = uri.path().strip_prefix("/c/")?;
    let mut parts = path.splitn(3, '/');
    let channel_type = parts.next()?.to_string();
    let channel_uuid = parts.next()?.to_string();
    let action = parts.next()?.to_string();
    if channel_type.is_empty() || channel_uuid.is_empty() || action.is_empty() {
        return None;
    }
    Some((channel_type, channel_uuid, action))
}

/// Unified webhook handler for raw Hyper.
pub async fn handle_webhook(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let Some((channel_type, channel_uuid, action)) = extract_route(req.uri()) else {
        return Ok(plain_response(StatusCode::NOT_FOUND, "application/json", r#"{"error":"not found"}"#));
    };

    let generic_headers = to_generic_headers(req.headers());
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body_bytes = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            return Ok(plain_response(StatusCode::BAD_REQUEST, "application/json", r#"{"error":"failed to read body"}"#));
        }
    };

    let raw = raw_request_from(content_type.as_deref(), &body_bytes);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let processor = WebhookProcessor::new(state.backend.clone(), state.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok(Response::builder()
        .status(status)
        .header("content-type", response.content_type)
        .body(Full::new(Bytes::from(response.body)))
        .unwrap())
}

/// Builds a `hyper` service closure bound to `state`.
pub fn make_service(
    state: AppState,
) -> impl Fn(Request<hyper::body::Incoming>) -> HyperServiceFuture + Clone {
    move |req| {
        let state = state.clone();
        Box::pin(handle_webhook(req, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanhub_core::prelude::MockBackend;

    #[test]
    fn extract_route_parses_three_segments() {
        let uri = "/c/t/4b9b1a9c-0000-0000-0000-000000000000/receive".parse::<Uri>().unwrap();
        assert_eq!(
            extract_route(&uri),
            Some((
                "t".to_string(),
                "4b9b1a9c-0000-0000-0000-000000000000".to_string(),
                "receive".to_string()
            ))
        );

        let uri = "/other/path".parse::<Uri>().unwrap();
        assert_eq!(extract_route(&uri), None);
    }

    #[tokio::test]
    async fn hyper_service_compiles() {
        let state = AppState {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };
        let _service = make_service(state);
    }
}
