//! M3Tech channel handler: form webhooks, no request signing,
//! GET-with-query-parameters sends, and an inbound success literal of the
//! form `SMS Accepted: <id>`.

use async_trait::async_trait;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::*;

const CHANNEL_TYPE: &str = "m3";
const CHANNEL_NAME: &str = "M3Tech";

const ROUTES: &[RouteSpec] = &[
    RouteSpec { method: "POST", action: "receive" },
    RouteSpec { method: "POST", action: "status" },
];

pub struct M3TechHandler;

#[derive(serde::Deserialize)]
struct ReceiveBody {
    from: String,
    message: String,
    id: String,
}

#[derive(serde::Deserialize)]
struct StatusBody {
    id: String,
    status: String,
}

fn map_status(code: &str) -> Option<Status> {
    match code {
        "1" => Some(Status::Delivered),
        "0" => Some(Status::Failed),
        _ => None,
    }
}

#[async_trait]
impl ChannelHandler for M3TechHandler {
    fn channel_type(&self) -> &'static str {
        CHANNEL_TYPE
    }

    fn channel_name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn routes(&self) -> &'static [RouteSpec] {
        ROUTES
    }

    fn redact_values(&self, channel: &Channel) -> Vec<String> {
        channel
            .config_str("password")
            .map(|password| vec![password.to_string()])
            .unwrap_or_default()
    }

    async fn decode_receive(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<ReceivedMsg, ChannelError> {
        let body: ReceiveBody = decode(raw, &["from", "message", "id"])?;
        let urn = parse_urn(&body.from, &channel.country)?;
        Ok(ReceivedMsg {
            msg: MsgIn::new(channel.uuid, urn, body.message, body.id),
            events: Vec::new(),
        })
    }

    /// The literal must read `SMS Accepted: <internal id>`, matched by the
    /// provider's delivery confirmation poller.
    fn write_msg_success_response(&self, internal_id: uuid::Uuid) -> WebhookResponse {
        WebhookResponse::plain(200, format!("SMS Accepted: {internal_id}"))
    }

    async fn decode_status(
        &self,
        _channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError> {
        let body: StatusBody = decode(raw, &["id", "status"])?;
        let status = match map_status(&body.status) {
            Some(status) => status,
            None => {
                return Ok(StatusOutcome::Ignored {
                    response: WebhookResponse::plain(200, "ignoring unknown status report"),
                })
            }
        };
        Ok(StatusOutcome::Update {
            target: chanhub_pipeline::status::correlate(None, Some(&body.id))
                .expect("external id always present"),
            status,
            new_external_id: None,
            urn_update: None,
            error: None,
            stop_event: None,
            response: WebhookResponse::plain(200, "OK"),
        })
    }

    async fn send(
        &self,
        ctx: &SendContext<'_>,
        channel: &Channel,
        msg: &MsgOut,
        log: &mut ChannelLog,
    ) -> StatusUpdate {
        send_message(ctx, channel, msg, log).await
    }
}

async fn send_message(
    ctx: &SendContext<'_>,
    channel: &Channel,
    msg: &MsgOut,
    log: &mut ChannelLog,
) -> StatusUpdate {
    let result: Result<StatusUpdate, ChannelError> = async {
        let username = channel.config_str_required("username")?;
        let password = channel.config_str_required("password")?;
        let base_url = channel
            .config_str("base_url")
            .unwrap_or("https://ppi.m3techservice.com")
            .to_string();

        let text = chanhub_core::gsm7::replace_substitutions(&msg.text);
        let opts = ComposeOptions {
            max_length: 160,
            channel_has_native_media: false,
            max_native_attachments: 0,
        };
        let parts = compose(&text, &msg.attachments, &opts);

        let url = format!("{}/api/sendsms", base_url.trim_end_matches('/'));

        let mut external_id: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let query = [
                ("username", username),
                ("password", password),
                ("type", "text"),
                ("mobile", msg.urn.path.as_str()),
                ("sms", part.text.as_str()),
            ];

            let started = std::time::Instant::now();
            let response = ctx
                .http
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

            let status_code = response.status();
            let body_text = response
                .text()
                .await
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

            log.push_trace(HttpTrace {
                request_line: format!("GET {url}"),
                request_body: format!("{query:?}"),
                response_line: format!("HTTP/1.1 {status_code}"),
                response_body: body_text.clone(),
                elapsed: started.elapsed(),
            });

            if status_code.is_server_error() {
                return Err(ChannelError::ConnectionFailed(format!(
                    "m3tech returned {status_code}"
                )));
            }
            if !status_code.is_success() {
                return Err(ChannelError::ResponseStatus {
                    status: status_code.as_u16(),
                    body: body_text,
                });
            }

            let message_id = body_text
                .trim()
                .strip_prefix("ID:")
                .map(|s| s.trim().to_string());
            if message_id.is_none() {
                tracing::warn!(channel = %channel.uuid, "m3tech response missing id field");
            }
            if index == 0 {
                external_id = message_id;
            }
        }

        let mut update = StatusUpdate::for_internal_id(channel.uuid, msg.id, Status::Wired);
        if let Some(external_id) = external_id {
            update = update.with_new_external_id(external_id);
        }
        Ok(update)
    }
    .await;

    match result {
        Ok(update) => update,
        Err(err) => {
            tracing::warn!(channel = %channel.uuid, error = %err, "m3tech send failed");
            log.push_error(LogError {
                code: "external-error".to_string(),
                external_code: None,
                message: err.to_string(),
            });
            let status = if err.retryable() { Status::Errored } else { Status::Failed };
            StatusUpdate::for_internal_id(channel.uuid, msg.id, status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_channel() -> Channel {
        let mut config = std::collections::HashMap::new();
        config.insert("username".to_string(), serde_json::json!("user1"));
        config.insert("password".to_string(), serde_json::json!("pw-secret"));
        Channel {
            uuid: uuid::Uuid::new_v4(),
            channel_type: CHANNEL_TYPE.to_string(),
            address: "12345".to_string(),
            country: "BD".to_string(),
            schemes: vec![UrnScheme::Tel],
            config,
            role: ChannelRole::RECEIVE | ChannelRole::SEND,
        }
    }

    #[tokio::test]
    async fn decodes_inbound_sms_and_parses_urn() {
        let channel = test_channel();
        let raw = RawRequest::Form("from=8801710000000&message=hi&id=abc123".to_string());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgReceive, vec![]);
        let received = M3TechHandler
            .decode_receive(&channel, &raw, &mut log)
            .await
            .unwrap();
        assert_eq!(received.msg.urn.path, "+8801710000000");
        assert_eq!(received.msg.text, "hi");
        assert_eq!(received.msg.external_id, "abc123");
    }

    #[test]
    fn success_response_embeds_the_internal_id() {
        let id = uuid::Uuid::new_v4();
        let response = M3TechHandler.write_msg_success_response(id);
        assert_eq!(response.body, format!("SMS Accepted: {id}"));
    }

    #[tokio::test]
    async fn delivered_status_maps_to_canonical_delivered() {
        let channel = test_channel();
        let raw = RawRequest::Form("id=abc123&status=1".to_string());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = M3TechHandler.decode_status(&channel, &raw, &mut log).await.unwrap();
        match outcome {
            StatusOutcome::Update { status, .. } => assert_eq!(status.code(), 'D'),
            _ => panic!("expected an update"),
        }
    }

    #[tokio::test]
    async fn unknown_status_code_is_ignored() {
        let channel = test_channel();
        let raw = RawRequest::Form("id=abc123&status=9".to_string());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = M3TechHandler.decode_status(&channel, &raw, &mut log).await.unwrap();
        assert!(matches!(outcome, StatusOutcome::Ignored { .. }));
    }
}
