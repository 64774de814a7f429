//! Nexmo channel handler: URL-encoded webhooks, no request signing,
//! POST-with-body sends, and the provider's own throttle-retry convention
//! (parse "wait N ms" out of the response body and sleep before retrying).

use async_trait::async_trait;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::*;
use std::time::Duration;

const CHANNEL_TYPE: &str = "nx";
const CHANNEL_NAME: &str = "Nexmo";
const MAX_SEND_ATTEMPTS: u32 = 3;

const ROUTES: &[RouteSpec] = &[
    RouteSpec { method: "POST", action: "receive" },
    RouteSpec { method: "POST", action: "status" },
];

pub struct NexmoHandler;

#[derive(serde::Deserialize)]
struct ReceiveBody {
    msisdn: String,
    to: String,
    text: String,
    #[serde(rename = "messageId")]
    message_id: String,
}

#[derive(serde::Deserialize)]
struct StatusBody {
    #[serde(rename = "messageId")]
    message_id: String,
    status: String,
    #[serde(rename = "err-code")]
    err_code: Option<String>,
}

fn map_status(status: &str) -> Option<Status> {
    match status {
        "submitted" | "accepted" => Some(Status::Queued),
        "buffered" => Some(Status::Wired),
        "delivered" => Some(Status::Delivered),
        "expired" | "failed" | "rejected" | "unknown" => Some(Status::Failed),
        _ => None,
    }
}

/// Extracts the millisecond wait hint out of Nexmo's throttle error text,
/// e.g. `"Throughput Rate Exceeded - please wait [ 250 ] and retry"`.
fn parse_wait_ms(error_text: &str) -> Option<u64> {
    let start = error_text.find('[')? + 1;
    let end = start + error_text[start..].find(']')?;
    error_text[start..end].trim().parse::<u64>().ok()
}

#[async_trait]
impl ChannelHandler for NexmoHandler {
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
        let mut values = Vec::new();
        if let Some(key) = channel.config_str("nexmo_api_key") {
            values.push(key.to_string());
        }
        if let Some(secret) = channel.config_str("nexmo_api_secret") {
            values.push(secret.to_string());
        }
        values
    }

    async fn decode_receive(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<ReceivedMsg, ChannelError> {
        let body: ReceiveBody = decode(raw, &["msisdn", "to", "text", "messageId"])?;
        let urn = parse_urn(&body.msisdn, &channel.country)?;
        Ok(ReceivedMsg {
            msg: MsgIn::new(channel.uuid, urn, body.text, body.message_id),
            events: Vec::new(),
        })
    }

    fn write_msg_success_response(&self, _internal_id: uuid::Uuid) -> WebhookResponse {
        WebhookResponse::plain(200, "")
    }

    async fn decode_status(
        &self,
        _channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError> {
        let body: StatusBody = decode(raw, &["messageId", "status"])?;
        let status = match map_status(&body.status) {
            Some(status) => status,
            None => {
                return Ok(StatusOutcome::Ignored {
                    response: WebhookResponse::plain(200, "ignoring unknown status report"),
                })
            }
        };
        let error = body.err_code.as_ref().map(|code| LogError {
            code: "external-error".to_string(),
            external_code: Some(code.clone()),
            message: format!("nexmo error code {code}"),
        });
        Ok(StatusOutcome::Update {
            target: chanhub_pipeline::status::correlate(None, Some(&body.message_id))
                .expect("external id always present"),
            status,
            new_external_id: None,
            urn_update: None,
            error,
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
        let api_key = channel.config_str_required("nexmo_api_key")?;
        let api_secret = channel.config_str_required("nexmo_api_secret")?;
        let base_url = channel
            .config_str("base_url")
            .unwrap_or("https://rest.nexmo.com")
            .to_string();
        let from = channel.address.clone();

        let text = chanhub_core::gsm7::replace_substitutions(&msg.text);
        let opts = ComposeOptions {
            max_length: 160,
            channel_has_native_media: false,
            max_native_attachments: 0,
        };
        let parts = compose(&text, &msg.attachments, &opts);

        let url = format!("{}/sms/json", base_url.trim_end_matches('/'));

        let mut external_id: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let form: Vec<(&str, &str)> = vec![
                ("api_key", api_key),
                ("api_secret", api_secret),
                ("from", from.as_str()),
                ("to", msg.urn.path.as_str()),
                ("text", part.text.as_str()),
            ];

            let message_id = send_part_with_retry(ctx, &url, &form, log).await?;
            if index == 0 {
                external_id = Some(message_id);
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
            tracing::warn!(channel = %channel.uuid, error = %err, "nexmo send failed");
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

/// Sends one part, retrying in place up to `MAX_SEND_ATTEMPTS` times when
/// Nexmo reports status `"1"` (throttled) with a "please wait N ms" hint.
/// Any other non-zero status is a terminal failure for this part.
async fn send_part_with_retry(
    ctx: &SendContext<'_>,
    url: &str,
    form: &[(&str, &str)],
    log: &mut ChannelLog,
) -> Result<String, ChannelError> {
    for attempt in 1..=MAX_SEND_ATTEMPTS {
        let started = std::time::Instant::now();
        let response = ctx
            .http
            .post(url)
            .form(form)
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
            request_body: format!("{form:?}"),
            response_line: format!("HTTP/1.1 {status_code}"),
            response_body: body_text.clone(),
            elapsed: started.elapsed(),
        });

        if status_code.is_server_error() {
            return Err(ChannelError::ConnectionFailed(format!(
                "nexmo returned {status_code}"
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
                field: "messages[0].message-id".to_string(),
            }
        })?;
        let message = parsed.get("messages").and_then(|m| m.get(0));
        let part_status = message.and_then(|m| m.get("status")).and_then(|v| v.as_str());

        match part_status {
            Some("0") => {
                let message_id = message
                    .and_then(|m| m.get("message-id"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ChannelError::ResponseValueMissing {
                        field: "messages[0].message-id".to_string(),
                    })?;
                return Ok(message_id.to_string());
            }
            Some("1") => {
                let error_text = message
                    .and_then(|m| m.get("error-text"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let wait_ms = parse_wait_ms(error_text).unwrap_or(250);
                if attempt == MAX_SEND_ATTEMPTS {
                    return Err(ChannelError::Throttled { retry_after_ms: wait_ms });
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                    _ = ctx.cancel.cancelled() => {
                        return Err(ChannelError::ConnectionFailed("cancelled while throttled".to_string()));
                    }
                }
            }
            Some(code) => {
                return Err(ChannelError::ExternalError {
                    code: code.to_string(),
                    message: format!("nexmo rejected message with status {code}"),
                })
            }
            None => {
                return Err(ChannelError::ResponseValueMissing {
                    field: "messages[0].status".to_string(),
                })
            }
        }
    }
    unreachable!("loop always returns or errors by the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_channel() -> Channel {
        let mut config = std::collections::HashMap::new();
        config.insert("nexmo_api_key".to_string(), serde_json::json!("key123"));
        config.insert("nexmo_api_secret".to_string(), serde_json::json!("secret456"));
        Channel {
            uuid: uuid::Uuid::new_v4(),
            channel_type: CHANNEL_TYPE.to_string(),
            address: "Nexmo".to_string(),
            country: "RW".to_string(),
            schemes: vec![UrnScheme::Tel],
            config,
            role: ChannelRole::RECEIVE | ChannelRole::SEND,
        }
    }

    #[test]
    fn parses_wait_hint_from_throttle_error_text() {
        let text = "Throughput Rate Exceeded - please wait [ 250 ] and retry";
        assert_eq!(parse_wait_ms(text), Some(250));
    }

    #[test]
    fn wait_hint_absent_is_none() {
        assert_eq!(parse_wait_ms("some other error"), None);
    }

    #[tokio::test]
    async fn decodes_inbound_sms_and_parses_urn() {
        let channel = test_channel();
        let raw = RawRequest::Form(
            "msisdn=250788383383&to=Nexmo&text=Hello&messageId=abc123".to_string(),
        );
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgReceive, vec![]);
        let received = NexmoHandler
            .decode_receive(&channel, &raw, &mut log)
            .await
            .unwrap();
        assert_eq!(received.msg.urn.path, "+250788383383");
        assert_eq!(received.msg.text, "Hello");
        assert_eq!(received.msg.external_id, "abc123");
    }

    #[tokio::test]
    async fn delivered_status_maps_to_canonical_delivered() {
        let channel = test_channel();
        let raw = RawRequest::Form("messageId=abc123&status=delivered".to_string());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = NexmoHandler.decode_status(&channel, &raw, &mut log).await.unwrap();
        match outcome {
            StatusOutcome::Update { status, .. } => assert_eq!(status.code(), 'D'),
            _ => panic!("expected an update"),
        }
    }

    #[tokio::test]
    async fn unmapped_status_string_is_ignored() {
        let channel = test_channel();
        let raw = RawRequest::Form("messageId=abc123&status=something-new".to_string());
        let mut log = ChannelLog::new(channel.uuid, LogType::MsgStatus, vec![]);
        let outcome = NexmoHandler.decode_status(&channel, &raw, &mut log).await.unwrap();
        assert!(matches!(outcome, StatusOutcome::Ignored { .. }));
    }
}
