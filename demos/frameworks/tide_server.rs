//! Runs the unified webhook endpoint on a Tide server.
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_tide::{configure_routes, AppState};
use std::sync::Arc;

#[async_std::main]
async fn main() -> tide::Result<()> {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    let mut app = tide::with_state(state);
    configure_routes(&mut app);

    println!("Tide webhook server listening on http://localhost:3000");
    println!("Send webhooks to: POST http://localhost:3000/c/t/<channel-uuid>/receive");

    app.listen("0.0.0.0:3000").await?;
    Ok(())
}
