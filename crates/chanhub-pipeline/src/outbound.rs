//! Drains the Backend's outgoing queue: for each `MsgOut`, resolves its
//! channel and handler, runs the adapter's `send`, and reports exactly one
//! `StatusUpdate` back to the Backend. Matches spec.md C8.

use crate::handler::{HandlerRegistry, SendContext};
use chanhub_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Runs forever (until `cancel` fires), polling the Backend's outgoing
/// queue and dispatching each claimed message to its adapter's `send`.
/// Mirrors spec.md §5: a bounded pool of worker tasks, each an independent
/// loop over `pop_next_outgoing_msg`.
pub async fn run_worker(
    backend: Arc<dyn Backend>,
    registry: HandlerRegistry,
    http: reqwest::Client,
    poll_interval: Duration,
    cancel: tokio_util::sync::CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let claimed = backend.pop_next_outgoing_msg().await;
        let Some(msg) = claimed else {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => continue,
                _ = cancel.cancelled() => return,
            }
        };

        let backend = backend.clone();
        let registry = registry.clone();
        let http = http.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let (msg_id, update) = send_one(backend.as_ref(), &registry, &http, &cancel, msg).await;
            backend.mark_outgoing_msg_complete(msg_id, update).await;
        });
    }
}

/// Sends one `MsgOut` to completion, returning its internal id and the
/// single `StatusUpdate` the pipeline reports for it regardless of how many
/// HTTP parts the adapter issued.
pub async fn send_one(
    backend: &dyn Backend,
    registry: &HandlerRegistry,
    http: &reqwest::Client,
    cancel: &tokio_util::sync::CancellationToken,
    msg: MsgOut,
) -> (uuid::Uuid, StatusUpdate) {
    let msg_id = msg.id;
    let mut log = ChannelLog::new(msg.channel, LogType::MsgSend, Vec::new());

    let Some(channel) = backend.get_channel_by_uuid(msg.channel).await else {
        tracing::warn!(channel = %msg.channel, "outbound: channel not found");
        log.push_error(LogError {
            code: "channel-config".to_string(),
            external_code: None,
            message: "channel not found".to_string(),
        });
        finish(backend, log).await;
        return (
            msg_id,
            StatusUpdate::for_internal_id(msg.channel, msg_id, Status::Failed),
        );
    };

    let Some(handler) = registry.get(&channel.channel_type) else {
        tracing::warn!(channel = %channel.uuid, channel_type = %channel.channel_type, "outbound: no handler registered");
        log.push_error(LogError {
            code: "channel-config".to_string(),
            external_code: None,
            message: format!("no handler for channel type {}", channel.channel_type),
        });
        finish(backend, log).await;
        return (
            msg_id,
            StatusUpdate::for_internal_id(msg.channel, msg_id, Status::Failed),
        );
    };

    log.redaction_values = handler.redact_values(&channel);

    let ctx = SendContext { http, cancel };
    let update = handler.send(&ctx, &channel, &msg, &mut log).await;

    tracing::info!(
        channel = %channel.uuid,
        provider = handler.channel_name(),
        msg = %msg_id,
        status = update.status.code(),
        "outbound send complete"
    );

    finish(backend, log).await;
    (msg_id, update)
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
    use crate::handler::{ChannelHandler, ReceivedMsg, RouteSpec, StatusOutcome, WebhookResponse};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct EchoHandler;

    const ROUTES: &[RouteSpec] = &[RouteSpec { method: "POST", action: "send" }];

    #[async_trait]
    impl ChannelHandler for EchoHandler {
        fn channel_type(&self) -> &'static str {
            "echo"
        }
        fn channel_name(&self) -> &'static str {
            "Echo"
        }
        fn routes(&self) -> &'static [RouteSpec] {
            ROUTES
        }
        fn redact_values(&self, _channel: &Channel) -> Vec<String> {
            vec!["secret-token".to_string()]
        }
        async fn decode_receive(
            &self,
            _channel: &Channel,
            _raw: &RawRequest,
            _log: &mut ChannelLog,
        ) -> Result<ReceivedMsg, ChannelError> {
            unimplemented!()
        }
        fn write_msg_success_response(&self, _internal_id: Uuid) -> WebhookResponse {
            WebhookResponse::plain(200, "ok")
        }
        async fn decode_status(
            &self,
            _channel: &Channel,
            _raw: &RawRequest,
            _log: &mut ChannelLog,
        ) -> Result<StatusOutcome, ChannelError> {
            unimplemented!()
        }
        async fn send(
            &self,
            _ctx: &SendContext<'_>,
            channel: &Channel,
            msg: &MsgOut,
            log: &mut ChannelLog,
        ) -> StatusUpdate {
            log.push_trace(HttpTrace {
                request_line: "POST https://echo.test/send".to_string(),
                request_body: format!("text={}", msg.text),
                response_line: "HTTP/1.1 200 OK".to_string(),
                response_body: "{\"id\":\"echo-1\"}".to_string(),
                elapsed: Duration::from_millis(5),
            });
            StatusUpdate::for_internal_id(channel.uuid, msg.id, Status::Wired)
                .with_new_external_id("echo-1")
        }
    }

    fn echo_channel(uuid: Uuid) -> Channel {
        Channel {
            uuid,
            channel_type: "echo".to_string(),
            address: "+14155550100".to_string(),
            country: "US".to_string(),
            schemes: vec![UrnScheme::Tel],
            config: std::collections::HashMap::new(),
            role: ChannelRole::SEND,
        }
    }

    #[tokio::test]
    async fn send_one_reports_a_single_status_update() {
        let backend = MockBackend::new();
        let uuid = Uuid::new_v4();
        backend.register_channel(echo_channel(uuid));
        let registry = HandlerRegistry::new().with(Arc::new(EchoHandler));
        let http = reqwest::Client::new();
        let cancel = tokio_util::sync::CancellationToken::new();

        let msg = MsgOut {
            id: Uuid::new_v4(),
            channel: uuid,
            urn: Urn::tel("+14155550101"),
            text: "hello".to_string(),
            attachments: vec![],
            quick_replies: vec![],
            locale: None,
            high_priority: false,
            response_to_external_id: None,
        };

        let (msg_id, update) = send_one(&backend, &registry, &http, &cancel, msg.clone()).await;
        assert_eq!(msg_id, msg.id);
        assert_eq!(update.status.code(), 'W');
        assert_eq!(update.new_external_id.as_deref(), Some("echo-1"));

        let logs = backend.logs().await;
        assert_eq!(logs.len(), 1);
        assert!(logs[0].traces[0].request_body.contains("hello"));
    }

    #[tokio::test]
    async fn unknown_channel_reports_failed_without_panicking() {
        let backend = MockBackend::new();
        let registry = HandlerRegistry::new();
        let http = reqwest::Client::new();
        let cancel = tokio_util::sync::CancellationToken::new();

        let msg = MsgOut {
            id: Uuid::new_v4(),
            channel: Uuid::new_v4(),
            urn: Urn::tel("+14155550101"),
            text: "hi".to_string(),
            attachments: vec![],
            quick_replies: vec![],
            locale: None,
            high_priority: false,
            response_to_external_id: None,
        };
        let (_, update) = send_one(&backend, &registry, &http, &cancel, msg).await;
        assert_eq!(update.status.code(), 'F');
    }
}
