//! Runs the unified webhook endpoint on a Warp server.
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_warp::{webhook_filter, AppState};
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    let routes = webhook_filter(state).with(warp::log("webhooks"));

    println!("Warp webhook server listening on http://localhost:3000");
    println!("Send webhooks to: POST http://localhost:3000/c/t/<channel-uuid>/receive");

    warp::serve(routes).run(([0, 0, 0, 0], 3000)).await;
}
