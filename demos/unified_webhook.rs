//! Runs a tiny Axum server that exposes the unified `/c/<type>/<uuid>/<action>`
//! webhook endpoint for every registered provider. A single `MockBackend`
//! channel stands in for a real Backend-provisioned Twilio channel.

use axum::Router;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_axum::{webhook_router, AppState};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let backend = Arc::new(MockBackend::new());

    let mut config = HashMap::new();
    config.insert("account_sid".to_string(), serde_json::json!("AC_demo"));
    config.insert("auth_token".to_string(), serde_json::json!("demo_token"));
    backend.register_channel(Channel {
        uuid: Uuid::new_v4(),
        channel_type: "t".to_string(),
        address: "+12028831111".to_string(),
        country: "US".to_string(),
        schemes: vec![UrnScheme::Tel],
        config,
        role: ChannelRole::RECEIVE | ChannelRole::SEND,
    });

    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    let app: Router = webhook_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    println!("Listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}
