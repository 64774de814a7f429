//! Macrokiosk channel handler: JSON webhooks, JSON-bodied sends with the
//! api key in the payload, and an inbound success literal that must stay
//! exactly `-1` (a bare string, not a JSON number).

use async_trait::async_trait;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::*;

const CHANNEL_TYPE: &str = "mk";
const CHANNEL_NAME: &str = "Macrokiosk";

const ROUTES: &[RouteSpec] = &[
    RouteSpec { method: "POST", action: "receive" },
    RouteSpec { method: "POST", action: "status" },
];

pub struct MacrokioskHandler;

#[derive(serde::Deserialize)]
struct ReceiveBody {
    msisdn: String,
    text: String,
    msgid: String,
}

#[derive(serde::Deserialize)]
struct StatusBody {
    msgid: String,
    status: String,
}

fn map_status(code: &str) -> Option<Status> {
    match code {
        "0" => Some(Status::Delivered),
        "2" => Some(Status::Queued),
        "1" | "3" | "4" => Some(Status::Failed),
        _ => None,
    }
}

#[async_trait]
impl ChannelHandler for MacrokioskHandler {
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
            .config_str("api_key")
            .map(|key| vec![key.to_string()])
            .unwrap_or_default()
    }

    async fn decode_receive(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<ReceivedMsg, ChannelError> {
        let body: ReceiveBody = decode(raw, &["msisdn", "text", "msgid"])?;
        let urn = parse_urn(&body.msisdn, &channel.country)?;
        Ok(ReceivedMsg {
            msg: MsgIn::new(channel.uuid, urn, body.text, body.msgid),
            events: Vec::new(),
        })
    }

    /// Macrokiosk's receiver expects the bare literal `-1`, not a JSON
    /// document and not the number `-1` — preserved exactly per adapter.
    fn write_msg_success_response(&self, _internal_id: uuid::Uuid) -> WebhookResponse {
        WebhookResponse::plain(200, "-1")
    }

    async fn decode_status(
        &self,
        _channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError> {
        let body: StatusBody = decode(raw, &["msgid", "status"])?;
        let status = match map_status(&body.status) {
            Some(status) => status,
            None => {
                return Ok(StatusOutcome::Ignored {
                    response: WebhookResponse::plain(200, "ignoring unknown status report"),
                })
            }
        };
        Ok(StatusOutcome::Update {
            target: chanhub_pipeline::status::correlate(None, Some(&body.msgid))
                .expect("external id always present"),
            status,
            new_external_id: None,
            urn_update: None,
            error: None,
            stop_event: None,
            response: WebhookResponse::plain(200, "-1"),
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
        let api_key = channel.config_str_required("api_key")?;
        let sender_id = channel.config_str_required("macrokiosk_sender_id")?;
        let service_id = channel.config_str_required("macrokiosk_service_id")?;
        let base_url = channel
            .config_str("base_url")
            .unwrap_or("https://www.etracker.cc")
            .to_string();

        let text = chanhub_core::gsm7::replace_substitutions(&msg.text);
        let opts = ComposeOptions {
            max_length: 160,
            channel_has_native_media: false,
            max_native_attachments: 0,
        };
        let parts = compose(&text, &msg.attachments, &opts);

        let url = format!("{}/bulksms/send", base_url.trim_end_matches('/'));

        let mut external_id: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let body = serde_json::json!({
                "apikey": api_key,
                "from": sender_id,
                "serviceid": service_id,
                "to": msg.urn.path,
                "text": part.text,
            });

            let started = std::time::Instant::now();
            let response = ctx
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

            let status_code = response.status();
            let body_text = response
                .text()
                .await
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

            log.push_trace(HttpTrace {
                request_line: format!("POST {url}"),
                request_body: body.to_string(),
                response_line: format!("HTTP/1.1 {status_code}"),
                response_body: body_text.clone(),
                elapsed: started.elapsed(),
            });

            if status_code.is_server_error() {
                return Err(ChannelError::ConnectionFailed(format!(
                    "macrokiosk returned {status_code}"
                )));
            }
            if !status_code.is_success() {
                return Err(ChannelError::ResponseStatus {
                    status: status_code.as_u16(),
                    body: body_text,
                });
            }

            let parsed: serde_json::Value = serde_json::from_str(&body_text).map_err(|_| {
                ChannelError::ResponseValueMissing {
                    field: "MsgID".to_string(),
                }
            })?;
            let msg_id = parsed.get("MsgID").and_then(|v| v.as_str());
            if index == 0 {
                external_id = msg_id.map(|s| s.to_string());
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
            tracing::warn!(channel = %channel.uuid, error = %err, "macrokiosk send failed");
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
        config.insert("api_key".to_string(), serde_json::json!("mk-secret"));
        config.insert("macrokiosk_sender_id".to_string(), serde_json::json!("MYBRAND"));
        config.insert("macrokiosk_service_id".to_string(), serde_json::json!("SVC1"));
        Channel {
            uuid: uuid::Uuid::new_v4(),
            channel_type: CHANNEL_TYPE.to_string(),
            address: "MYBRAND".to_string(),
            country: "MY".to_string(),
            schemes: vec![UrnScheme::Tel],
            config,
            role: ChannelRole::RECEIVE | ChannelRole::SEND,
        }
    }

    #[tokio::test]
    async fn decodes_inbound_sms_and_parses_urn() {
        let channel = test_channel();
        let raw = RawRequest::Json(
            br#"{"msisdn":"60123456789","text":"hi","msgid":"abc123"}"#.to_vec(),
        );
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgReceive, vec![]);
        let received = MacrokioskHandler
            .decode_receive(&channel, &raw, &mut log)
            .await
            .unwrap();
        assert_eq!(received.msg.urn.path, "+60123456789");
        assert_eq!(received.msg.text, "hi");
        assert_eq!(received.msg.external_id, "abc123");
    }

    #[test]
    fn success_response_is_the_exact_bare_literal() {
        let response = MacrokioskHandler.write_msg_success_response(uuid::Uuid::new_v4());
        assert_eq!(response.body, "-1");
        assert_ne!(response.body, "\"-1\"");
    }

    #[tokio::test]
    async fn delivered_status_maps_to_canonical_delivered() {
        let channel = test_channel();
        let raw = RawRequest::Json(br#"{"msgid":"abc123","status":"0"}"#.to_vec());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = MacrokioskHandler
            .decode_status(&channel, &raw, &mut log)
            .await
            .unwrap();
        match outcome {
            StatusOutcome::Update { status, response, .. } => {
                assert_eq!(status.code(), 'D');
                assert_eq!(response.body, "-1");
            }
            _ => panic!("expected an update"),
        }
    }

    #[tokio::test]
    async fn unknown_status_code_is_ignored() {
        let channel = test_channel();
        let raw = RawRequest::Json(br#"{"msgid":"abc123","status":"99"}"#.to_vec());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = MacrokioskHandler
            .decode_status(&channel, &raw, &mut log)
            .await
            .unwrap();
        assert!(matches!(outcome, StatusOutcome::Ignored { .. }));
    }

    #[test]
    fn a_210_char_message_splits_into_two_parts_under_160() {
        let text = "a".repeat(210);
        let opts = ComposeOptions {
            max_length: 160,
            channel_has_native_media: false,
            max_native_attachments: 0,
        };
        let parts = compose(&text, &[], &opts);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.text.chars().count() <= 160));
        let rejoined: String = parts.iter().map(|p| p.text.clone()).collect();
        assert_eq!(rejoined, text);
    }
}
