//! # chanhub-pipeline
//!
//! The handler contract and registry (C6), the inbound webhook pipeline
//! (C7), the outbound send pipeline (C8), and the status pipeline (C9) of
//! the chanhub messaging gateway. Provider adapters implement
//! [`handler::ChannelHandler`]; an HTTP framework binding owns routing and
//! calls [`inbound::handle_webhook`].

pub mod handler;
pub mod inbound;
pub mod outbound;
pub mod status;

pub mod prelude {
    pub use crate::handler::{
        ChannelHandler, HandlerRegistry, ReceivedMsg, RouteSpec, SendContext, StatusOutcome,
        WebhookResponse,
    };
    pub use crate::inbound::{handle_webhook, WebhookRequest};
    pub use crate::outbound::{run_worker, send_one};
}
