//! Runs the unified webhook endpoint on a Poem server.
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_poem::{unified_webhook, AppState};
use poem::{listener::TcpListener, post, EndpointExt, Route, Server};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    let app = Route::new()
        .at("/c/:channel_type/:channel_uuid/:action", post(unified_webhook))
        .data(state);

    println!("Poem webhook server listening on http://localhost:3000");
    println!("Send webhooks to: POST http://localhost:3000/c/t/<channel-uuid>/receive");

    Server::new(TcpListener::bind("0.0.0.0:3000")).run(app).await
}
