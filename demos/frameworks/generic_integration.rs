//! Shows how to integrate chanhub with any web framework by going through
//! `chanhub-web-generic` directly instead of one of the framework adapters.

use chanhub_core::prelude::{Channel, ChannelRole, MockBackend, UrnScheme};
use chanhub_pipeline::prelude::{HandlerRegistry, WebhookResponse};
use chanhub_twilio::TwilioHandler;
use chanhub_web_generic::{build_request_url, raw_request_from, Headers, WebhookProcessor};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

// Simulated request from any web framework.
struct GenericRequest {
    pub channel_type: String,
    pub channel_uuid: String,
    pub action: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

// Simulated response for any web framework.
struct GenericResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl From<WebhookResponse> for GenericResponse {
    fn from(response: WebhookResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type.to_string(),
            body: response.body,
        }
    }
}

/// This is how you would integrate chanhub into ANY web framework: extract
/// `(channel_type, channel_uuid, action)` from the route, headers and raw
/// bytes from the request, then hand everything to `WebhookProcessor`.
async fn handle_webhook(processor: &WebhookProcessor, req: GenericRequest) -> GenericResponse {
    let content_type = req
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str());
    let raw = raw_request_from(content_type, &req.body);
    let path = format!("/c/{}/{}/{}", req.channel_type, req.channel_uuid, req.action);
    let request_url = build_request_url(&req.headers, &path);

    let response = processor
        .process(
            &req.channel_type,
            &req.channel_uuid,
            &req.action,
            &request_url,
            &req.headers,
            raw,
        )
        .await;
    response.into()
}

#[tokio::main]
async fn main() {
    println!("=== chanhub generic integration example ===");

    let backend = Arc::new(MockBackend::new());
    let channel_uuid = Uuid::new_v4();
    let mut config = HashMap::new();
    config.insert("account_sid".to_string(), serde_json::json!("AC_demo"));
    config.insert("auth_token".to_string(), serde_json::json!("demo_token"));
    backend.register_channel(Channel {
        uuid: channel_uuid,
        channel_type: "t".to_string(),
        address: "+12028831111".to_string(),
        country: "US".to_string(),
        schemes: vec![UrnScheme::Tel],
        config,
        role: ChannelRole::RECEIVE | ChannelRole::SEND,
    });

    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let processor = WebhookProcessor::new(backend, registry);

    let request = GenericRequest {
        channel_type: "t".to_string(),
        channel_uuid: channel_uuid.to_string(),
        action: "receive".to_string(),
        headers: vec![(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )],
        body: "From=%2B1234567890&To=%2B12028831111&Body=Hello%20World&MessageSid=SM123"
            .as_bytes()
            .to_vec(),
    };

    let response = handle_webhook(&processor, request).await;

    println!("Response Status: {}", response.status);
    println!("Response Content-Type: {}", response.content_type);
    println!("Response Body: {}", response.body);

    println!("\nThis same pattern works with any web framework.");
    println!("Adapt the request/response extraction and the rest stays unchanged.");
}
