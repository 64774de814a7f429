//! # chanhub-core
//!
//! Canonical data model, error taxonomy and support utilities shared by every
//! provider adapter and pipeline stage in the chanhub messaging gateway:
//! GSM-7 alphabet classification, request signing and OAuth token caching,
//! payload decoding, URN parsing, message composition, channel logging and
//! the `Backend` persistence contract.

pub mod auth;
pub mod backend;
pub mod compose;
pub mod decode;
pub mod error;
pub mod gsm7;
pub mod log;
pub mod model;
pub mod urn;

pub mod prelude {
    pub use crate::auth::{OAuthTokenCache, TokenStore};
    pub use crate::backend::{Backend, MockBackend};
    pub use crate::compose::{compose, ComposeOptions, SendPart};
    pub use crate::decode::{decode, to_param_map, RawRequest};
    pub use crate::error::ChannelError;
    pub use crate::gsm7::{select_encoding, Encoding};
    pub use crate::log::{ChannelLog, HttpTrace, LogError, LogType};
    pub use crate::model::{
        Attachment, Channel, ChannelEvent, ChannelEventType, ChannelRole, MsgIn, MsgOut, Status,
        StatusTarget, StatusUpdate, Urn, UrnScheme,
    };
    pub use crate::urn::parse_urn;
}
