//! Sends one SMS through the Twilio adapter, end to end through the
//! outbound pipeline (compose -> split -> HTTP -> status), against a
//! `MockBackend` channel built from CLI args / env vars.

use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::{send_one, HandlerRegistry};
use chanhub_twilio::TwilioHandler;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let account_sid = arg_or_env("--account-sid", "TWILIO_ACCOUNT_SID");
    let auth_token = arg_or_env("--auth-token", "TWILIO_AUTH_TOKEN");
    let from = arg_or_env("--from", "SMS_FROM");
    let to = arg_or_env("--to", "SMS_TO");
    let text = arg_or_env("--text", "SMS_TEXT");

    let backend = Arc::new(MockBackend::new());
    let channel_uuid = Uuid::new_v4();

    let mut config = HashMap::new();
    config.insert("account_sid".to_string(), serde_json::json!(account_sid));
    config.insert("auth_token".to_string(), serde_json::json!(auth_token));
    backend.register_channel(Channel {
        uuid: channel_uuid,
        channel_type: "t".to_string(),
        address: from,
        country: "US".to_string(),
        schemes: vec![UrnScheme::Tel],
        config,
        role: ChannelRole::RECEIVE | ChannelRole::SEND,
    });

    let msg = MsgOut {
        id: Uuid::new_v4(),
        channel: channel_uuid,
        urn: Urn::tel(to),
        text,
        attachments: Vec::new(),
        quick_replies: Vec::new(),
        locale: None,
        high_priority: false,
        response_to_external_id: None,
    };

    let registry = HandlerRegistry::new().with(Arc::new(TwilioHandler));
    let http = reqwest::Client::new();
    let cancel = tokio_util::sync::CancellationToken::new();

    let (msg_id, update) = send_one(backend.as_ref(), &registry, &http, &cancel, msg).await;
    println!(
        "msg {msg_id}: status {:?}, external_id {:?}",
        update.status, update.new_external_id
    );
    Ok(())
}

fn arg_or_env(flag: &str, env_key: &str) -> String {
    let args: Vec<String> = std::env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == flag) {
        if idx + 1 < args.len() {
            return args[idx + 1].clone();
        }
    }
    env::var(env_key)
        .unwrap_or_else(|_| panic!("missing {} (arg {} or env {})", flag, flag, env_key))
}
