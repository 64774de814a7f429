//! Webhook handling: decode -> validate -> normalize -> hand to Backend ->
//! write the provider's canonical HTTP response. Never returns `Err` across
//! the HTTP boundary — every failure becomes a `WebhookResponse`.

use crate::handler::{HandlerRegistry, ReceivedMsg, WebhookResponse};
use chanhub_core::prelude::*;
use uuid::Uuid;

/// One inbound webhook call, already split into its routing coordinates by
/// whatever HTTP framework adapter owns the route table.
pub struct WebhookRequest {
    pub channel_type: String,
    pub channel_uuid: Uuid,
    pub action: String,
    pub request_url: String,
    pub forwarded_path: Option<String>,
    pub signature_header: Option<String>,
    pub raw: RawRequest,
}

fn log_type_for_action(action: &str) -> LogType {
    match action {
        "receive" => LogType::MsgReceive,
        "status" | "delivered" | "dlr" => LogType::MsgStatus,
        _ => LogType::EventReceive,
    }
}

/// Handles one webhook end to end. Matches spec.md C7 steps 1-8.
pub async fn handle_webhook(
    backend: &dyn Backend,
    registry: &HandlerRegistry,
    req: WebhookRequest,
) -> WebhookResponse {
    let Some(handler) = registry.get(&req.channel_type) else {
        tracing::warn!(channel_type = %req.channel_type, "no handler registered for channel type");
        return WebhookResponse::plain(404, "not found");
    };

    let Some(channel) = backend
        .get_channel(&req.channel_type, req.channel_uuid)
        .await
    else {
        tracing::warn!(channel = %req.channel_uuid, "channel not found");
        return WebhookResponse::plain(404, "not found");
    };

    let mut log = ChannelLog::new(
        channel.uuid,
        log_type_for_action(&req.action),
        handler.redact_values(&channel),
    );

    if handler.requires_signature(&req.action) {
        if let Err(err) = handler.verify_signature(
            &channel,
            &req.request_url,
            req.forwarded_path.as_deref(),
            &req.raw,
            req.signature_header.as_deref(),
        ) {
            tracing::warn!(channel = %channel.uuid, error = %err, "signature verification failed");
            log.push_error(LogError {
                code: "signature-invalid".to_string(),
                external_code: None,
                message: err.to_string(),
            });
            finish(backend, log).await;
            return WebhookResponse::plain(err.http_status(), err.to_string());
        }
    }

    let response = match req.action.as_str() {
        "receive" => handle_receive(backend, handler.as_ref(), &channel, &req.raw, &mut log).await,
        _ => handle_status(backend, handler.as_ref(), &channel, &req.raw, &mut log).await,
    };

    finish(backend, log).await;
    response
}

async fn handle_receive(
    backend: &dyn Backend,
    handler: &dyn crate::handler::ChannelHandler,
    channel: &Channel,
    raw: &RawRequest,
    log: &mut ChannelLog,
) -> WebhookResponse {
    let ReceivedMsg { msg, events } = match handler.decode_receive(channel, raw, log).await {
        Ok(received) => received,
        Err(err) => {
            tracing::debug!(channel = %channel.uuid, error = %err, "inbound decode failed");
            log.push_error(LogError {
                code: "request-invalid".to_string(),
                external_code: None,
                message: err.to_string(),
            });
            return WebhookResponse::plain(err.http_status(), err.to_string());
        }
    };

    let internal_id = match backend.write_msg(msg, log).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(channel = %channel.uuid, error = %err, "backend write_msg failed");
            log.push_error(LogError {
                code: "backend".to_string(),
                external_code: None,
                message: err.to_string(),
            });
            return WebhookResponse::plain(500, "internal error");
        }
    };

    for event in events {
        if let Err(err) = backend.write_channel_event(event, log).await {
            tracing::warn!(channel = %channel.uuid, error = %err, "backend write_channel_event failed");
        }
    }

    tracing::info!(channel = %channel.uuid, provider = handler.channel_name(), msg = %internal_id, "inbound message persisted");
    handler.write_msg_success_response(internal_id)
}

async fn handle_status(
    backend: &dyn Backend,
    handler: &dyn crate::handler::ChannelHandler,
    channel: &Channel,
    raw: &RawRequest,
    log: &mut ChannelLog,
) -> WebhookResponse {
    let outcome = match handler.decode_status(channel, raw, log).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::debug!(channel = %channel.uuid, error = %err, "status decode failed");
            log.push_error(LogError {
                code: "request-invalid".to_string(),
                external_code: None,
                message: err.to_string(),
            });
            return WebhookResponse::plain(err.http_status(), err.to_string());
        }
    };

    crate::status::handle(backend, handler, channel, outcome, log).await
}

async fn finish(backend: &dyn Backend, mut log: ChannelLog) {
    log.redact();
    if let Err(err) = backend.write_channel_log(log).await {
        tracing::warn!(error = %err, "failed to persist channel log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ChannelHandler, RouteSpec, SendContext, StatusOutcome};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ToyHandler;

    const ROUTES: &[RouteSpec] = &[
        RouteSpec { method: "POST", action: "receive" },
        RouteSpec { method: "POST", action: "status" },
    ];

    #[async_trait]
    impl ChannelHandler for ToyHandler {
        fn channel_type(&self) -> &'static str {
            "toy"
        }

        fn channel_name(&self) -> &'static str {
            "Toy"
        }

        fn routes(&self) -> &'static [RouteSpec] {
            ROUTES
        }

        fn redact_values(&self, _channel: &Channel) -> Vec<String> {
            Vec::new()
        }

        async fn decode_receive(
            &self,
            channel: &Channel,
            raw: &RawRequest,
            _log: &mut ChannelLog,
        ) -> Result<ReceivedMsg, ChannelError> {
            #[derive(serde::Deserialize)]
            struct Body {
                from: String,
                text: String,
                id: String,
            }
            let body: Body = decode(raw, &["from", "text", "id"])?;
            let urn = parse_urn(&body.from, &channel.country)?;
            Ok(ReceivedMsg {
                msg: MsgIn::new(channel.uuid, urn, body.text, body.id),
                events: Vec::new(),
            })
        }

        fn write_msg_success_response(&self, _internal_id: Uuid) -> WebhookResponse {
            WebhookResponse::plain(200, "ok")
        }

        async fn decode_status(
            &self,
            _channel: &Channel,
            raw: &RawRequest,
            _log: &mut ChannelLog,
        ) -> Result<StatusOutcome, ChannelError> {
            #[derive(serde::Deserialize)]
            struct Body {
                id: String,
                code: String,
            }
            let body: Body = decode(raw, &["id", "code"])?;
            let status = match body.code.as_str() {
                "3" => Status::Delivered,
                _ => {
                    return Ok(StatusOutcome::Ignored {
                        response: WebhookResponse::plain(200, "ignored"),
                    })
                }
            };
            Ok(StatusOutcome::Update {
                target: crate::status::correlate(None, Some(&body.id)).unwrap(),
                status,
                new_external_id: None,
                urn_update: None,
                error: None,
                stop_event: None,
                response: WebhookResponse::plain(200, format!("{{\"status\":\"{}\"}}", status.code())),
            })
        }

        async fn send(
            &self,
            _ctx: &SendContext<'_>,
            channel: &Channel,
            msg: &MsgOut,
            _log: &mut ChannelLog,
        ) -> StatusUpdate {
            StatusUpdate::for_internal_id(channel.uuid, msg.id, Status::Wired)
        }
    }

    fn toy_channel(uuid: Uuid) -> Channel {
        Channel {
            uuid,
            channel_type: "toy".to_string(),
            address: "+14155550100".to_string(),
            country: "US".to_string(),
            schemes: vec![UrnScheme::Tel],
            config: std::collections::HashMap::new(),
            role: ChannelRole::RECEIVE | ChannelRole::SEND,
        }
    }

    #[tokio::test]
    async fn receive_persists_and_dedups() {
        let backend = MockBackend::new();
        let uuid = Uuid::new_v4();
        backend.register_channel(toy_channel(uuid));
        let registry = HandlerRegistry::new().with(Arc::new(ToyHandler));

        let req = WebhookRequest {
            channel_type: "toy".to_string(),
            channel_uuid: uuid,
            action: "receive".to_string(),
            request_url: "https://example.test/c/toy/x/receive".to_string(),
            forwarded_path: None,
            signature_header: None,
            raw: RawRequest::Form("from=%2B14155550101&text=hi&id=abc".to_string()),
        };
        let response = handle_webhook(&backend, &registry, req).await;
        assert_eq!(response.status, 200);

        let req2 = WebhookRequest {
            channel_type: "toy".to_string(),
            channel_uuid: uuid,
            action: "receive".to_string(),
            request_url: "https://example.test/c/toy/x/receive".to_string(),
            forwarded_path: None,
            signature_header: None,
            raw: RawRequest::Form("from=%2B14155550101&text=hi+again&id=abc".to_string()),
        };
        let response2 = handle_webhook(&backend, &registry, req2).await;
        assert_eq!(response2.status, 200);
        assert_eq!(backend.logs().await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_channel_type_is_404() {
        let backend = MockBackend::new();
        let registry = HandlerRegistry::new();
        let req = WebhookRequest {
            channel_type: "nope".to_string(),
            channel_uuid: Uuid::new_v4(),
            action: "receive".to_string(),
            request_url: String::new(),
            forwarded_path: None,
            signature_header: None,
            raw: RawRequest::Form(String::new()),
        };
        let response = handle_webhook(&backend, &registry, req).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn unknown_status_code_is_ignored_not_rejected() {
        let backend = MockBackend::new();
        let uuid = Uuid::new_v4();
        backend.register_channel(toy_channel(uuid));
        let registry = HandlerRegistry::new().with(Arc::new(ToyHandler));

        let req = WebhookRequest {
            channel_type: "toy".to_string(),
            channel_uuid: uuid,
            action: "status".to_string(),
            request_url: String::new(),
            forwarded_path: None,
            signature_header: None,
            raw: RawRequest::Form("id=abc&code=99".to_string()),
        };
        let response = handle_webhook(&backend, &registry, req).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ignored");
    }
}
