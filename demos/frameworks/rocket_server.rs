//! Runs the unified webhook endpoint on a Rocket server.
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_rocket::{unified_webhook, AppState};
use std::sync::Arc;

#[rocket::launch]
fn rocket() -> _ {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    println!("Rocket webhook server will start on http://localhost:8000");
    println!("Send webhooks to: POST http://localhost:8000/c/t/<channel-uuid>/receive");

    rocket::build()
        .manage(state)
        .mount("/", rocket::routes![unified_webhook])
}
