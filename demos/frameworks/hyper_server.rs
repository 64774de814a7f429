//! Runs the unified webhook endpoint on a raw Hyper server.
use chanhub_core::prelude::MockBackend;
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_twilio::TwilioHandler;
use chanhub_web_hyper::{make_service, AppState};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let backend = Arc::new(MockBackend::new());
    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let state = AppState { backend, registry };

    let service = make_service(state);
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr).await?;

    println!("Hyper webhook server listening on http://{}", addr);
    println!("Send webhooks to: POST http://{}/c/t/<channel-uuid>/receive", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            let service_fn = hyper::service::service_fn(move |req| {
                let service = service.clone();
                async move { service(req).await }
            });

            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn)
                .await
            {
                eprintln!("Error serving connection: {:?}", err);
            }
        });
    }
}
