//! Runs the unified webhook endpoint on an Actix-web server.
use actix_web::{web, App, HttpServer};
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_actix::{configure_routes, AppData};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let app_data = AppData { backend, registry };

    println!("Actix-web webhook server listening on http://localhost:3000");
    println!("Send webhooks to: POST http://localhost:3000/c/t/<channel-uuid>/receive");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_data.clone()))
            .configure(configure_routes)
    })
    .bind("0.0.0.0:3000")?
    .run()
    .await
}
