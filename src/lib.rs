//! # chanhub
//!
//! Messaging gateway: normalizes heterogeneous SMS/chat provider webhooks
//! into a canonical inbound/outbound/status model, and dispatches canonical
//! outbound messages back out as provider-specific HTTP calls.
//!
//! This crate is the composition root: it pulls together `chanhub-core`
//! (the data model and shared utilities), `chanhub-pipeline` (the handler
//! contract and the inbound/outbound/status pipelines), the provider
//! adapters, and an HTTP framework binding (Axum by default; Warp, Actix,
//! Rocket, Poem, raw Hyper, and Tide behind feature flags). Everything a
//! deployment needs beyond that — the HTTP listener, Backend storage,
//! metrics shipping — is a collaborator the process wires up itself.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use chanhub::prelude::*;
//! use chanhub_twilio::TwilioHandler;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend: Arc<dyn Backend> = Arc::new(MockBackend::new());
//!     let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
//!     let state = chanhub_web_axum::AppState { backend, registry };
//!     let router = chanhub_web_axum::webhook_router(state);
//!     // axum::serve(listener, router).await.unwrap();
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use chanhub::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod config;
pub mod rate_limiter;

pub use config::*;

/// Common imports for building a chanhub-based gateway process.
pub mod prelude {
    pub use crate::config::{
        AppConfig, LoggingConfig, ProvidersConfig, SecurityConfig, ServerConfig,
    };
    pub use crate::rate_limiter::{
        DefaultKeyGenerator, KeyGenerator, RateLimitMiddleware, RateLimitResult, RateLimiter,
    };
    pub use chanhub_core::prelude::*;
    pub use chanhub_pipeline::prelude::*;
}
