//! Rocket adapter: same unified-dispatch shape as `chanhub-web-axum`, wired
//! to Rocket's data-guard and state conventions.

use chanhub_core::prelude::Backend;
use chanhub_pipeline::prelude::{HandlerRegistry, WebhookResponse};
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use rocket::{http::Status, Request as RocketRequest, State};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub registry: HandlerRegistry,
}

/// Raw, unparsed request body. Rocket has no framework-level concept of
/// "JSON or form, whichever the client sent" the way other adapters do, so
/// the webhook handler always reads bytes and lets `raw_request_from`
/// dispatch on the `Content-Type` header itself.
#[derive(Debug)]
pub struct RawBody(pub Vec<u8>);

#[rocket::async_trait]
impl<'r> rocket::data::FromData<'r> for RawBody {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    async fn from_data(
        _req: &'r rocket::Request<'_>,
        data: rocket::Data<'r>,
    ) -> rocket::data::Outcome<'r, Self> {
        use rocket::data::ToByteUnit;

        match data.open(2.megabytes()).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => {
                rocket::data::Outcome::Success(RawBody(bytes.into_inner()))
            }
            Ok(_) => rocket::data::Outcome::Error((
                Status::PayloadTooLarge,
                Box::new(std::io::Error::other("body too large")),
            )),
            Err(e) => rocket::data::Outcome::Error((Status::BadRequest, Box::new(e))),
        }
    }
}

fn to_generic_headers(req: &RocketRequest<'_>) -> Headers {
    req.headers()
        .iter()
        .map(|h| (h.name().to_string(), h.value().to_string()))
        .collect()
}

fn into_rocket_response(response: WebhookResponse) -> (Status, (rocket::http::ContentType, String)) {
    let status = Status::from_code(response.status).unwrap_or(Status::InternalServerError);
    let content_type = match response.content_type {
        "application/json" => rocket::http::ContentType::JSON,
        _ => rocket::http::ContentType::Plain,
    };
    (status, (content_type, response.body))
}

/// Unified handler: `/c/<channel_type>/<channel_uuid>/<action>`.
#[rocket::post("/c/<channel_type>/<channel_uuid>/<action>", data = "<body>")]
pub async fn unified_webhook(
    channel_type: String,
    channel_uuid: String,
    action: String,
    body: RawBody,
    req: &RocketRequest<'_>,
    state: &State<AppState>,
) -> (Status, (rocket::http::ContentType, String)) {
    let generic_headers = to_generic_headers(req);
    let content_type = req.headers().get_one("content-type");
    let raw = raw_request_from(content_type, &body.0);
    let request_url = build_request_url(
        &generic_headers,
        &format!("/c/{channel_type}/{channel_uuid}/{action}"),
    );

    let processor = WebhookProcessor::new(state.backend.clone(), state.registry.clone());
    let response = processor
        .process(&channel_type, &channel_uuid, &action, &request_url, &generic_headers, raw)
        .await;
    into_rocket_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanhub_core::prelude::MockBackend;

    #[test]
    fn rocket_types_compile() {
        let _state = AppState {
            backend: Arc::new(MockBackend::new()),
            registry: HandlerRegistry::new(),
        };
    }
}
