//! Clickatell channel handler: JSON webhooks, no request signing, a
//! UTF-16BE percent-escaped text recovery path that is load-bearing for a
//! subset of inbound payloads, and GET-with-query-parameters sends.

use async_trait::async_trait;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::*;
use time::OffsetDateTime;

const CHANNEL_TYPE: &str = "ct";
const CHANNEL_NAME: &str = "Clickatell";

const ROUTES: &[RouteSpec] = &[
    RouteSpec { method: "POST", action: "receive" },
    RouteSpec { method: "POST", action: "status" },
];

pub struct ClickatellHandler;

#[derive(serde::Deserialize)]
struct ReceiveBody {
    #[serde(rename = "messageId")]
    message_id: String,
    #[serde(rename = "fromNumber")]
    from_number: String,
    timestamp: Option<i64>,
    text: String,
    charset: Option<String>,
}

#[derive(serde::Deserialize)]
struct StatusBody {
    #[serde(rename = "apiMsgId")]
    api_msg_id: String,
    status: String,
}

/// Decodes Clickatell's `charset: "UTF-16BE"` text encoding: the body is a
/// run of `%XX` percent escapes over big-endian UTF-16 code units, not over
/// UTF-8 bytes. This is a narrow, provider-specific recovery path; it is not
/// a general percent-decoder and must not be reused for other charsets.
fn decode_utf16be(raw: &str) -> Result<String, ChannelError> {
    let bytes: Vec<u8> = percent_encoding::percent_decode_str(raw).collect();
    if bytes.len() % 2 != 0 {
        return Err(ChannelError::RequestInvalid {
            field: "text (odd byte count for UTF-16BE)".to_string(),
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| ChannelError::RequestInvalid {
        field: "text (invalid UTF-16BE)".to_string(),
    })
}

/// `timestamp` is milliseconds since epoch. A structurally absent timestamp
/// falls back to the current time. A present-but-unparseable value is
/// rejected rather than silently defaulted: unlike absence, it signals a
/// malformed upstream payload worth surfacing as a 400.
fn parse_received_on(timestamp_ms: Option<i64>) -> Result<OffsetDateTime, ChannelError> {
    match timestamp_ms {
        None => Ok(OffsetDateTime::now_utc()),
        Some(ms) => OffsetDateTime::from_unix_timestamp(ms.div_euclid(1000)).map_err(|_| {
            ChannelError::RequestInvalid {
                field: "timestamp".to_string(),
            }
        }),
    }
}

/// Both 3 ("delivered to gateway") and 4 ("delivered to handset") are
/// treated as final delivery in this variant of the status callback; kept
/// as two mapping entries rather than collapsed, per the provider's own
/// dual encoding of the same outcome.
fn map_status(code: &str) -> Option<Status> {
    match code {
        "1" | "2" | "11" => Some(Status::Queued),
        "8" => Some(Status::Sent),
        "3" | "4" => Some(Status::Delivered),
        "5" | "6" | "7" | "9" | "10" | "12" => Some(Status::Failed),
        _ => None,
    }
}

#[async_trait]
impl ChannelHandler for ClickatellHandler {
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
        let body: ReceiveBody = decode(raw, &["messageId", "fromNumber", "text"])?;
        let text = match body.charset.as_deref() {
            Some("UTF-16BE") => decode_utf16be(&body.text)?,
            _ => body.text,
        };
        let urn = parse_urn(&body.from_number, &channel.country)?;
        let received_on = parse_received_on(body.timestamp)?;
        Ok(ReceivedMsg {
            msg: MsgIn::new(channel.uuid, urn, text, body.message_id).with_received_on(received_on),
            events: Vec::new(),
        })
    }

    fn write_msg_success_response(&self, _internal_id: uuid::Uuid) -> WebhookResponse {
        WebhookResponse::plain(200, "Accepted")
    }

    async fn decode_status(
        &self,
        _channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError> {
        let body: StatusBody = decode(raw, &["apiMsgId", "status"])?;
        let status = match map_status(&body.status) {
            Some(status) => status,
            None => {
                return Ok(StatusOutcome::Ignored {
                    response: WebhookResponse::plain(200, "ignoring unknown status report"),
                })
            }
        };
        Ok(StatusOutcome::Update {
            target: chanhub_pipeline::status::correlate(None, Some(&body.api_msg_id))
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
        let api_key = channel.config_str_required("api_key")?;
        let base_url = channel
            .config_str("base_url")
            .unwrap_or("https://platform.clickatell.com")
            .to_string();
        let from = channel.address.clone();

        let text = chanhub_core::gsm7::replace_substitutions(&msg.text);
        let opts = ComposeOptions {
            max_length: 160,
            channel_has_native_media: false,
            max_native_attachments: 0,
        };
        let parts = compose(&text, &msg.attachments, &opts);

        let url = format!("{}/messages/http/send", base_url.trim_end_matches('/'));

        let mut external_id: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let query = [
                ("apiKey", api_key),
                ("to", msg.urn.path.as_str()),
                ("from", from.as_str()),
                ("content", part.text.as_str()),
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
                    "clickatell returned {status_code}"
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
                    field: "apiMessageId".to_string(),
                }
            })?;
            let message_id = parsed
                .get("messages")
                .and_then(|m| m.get(0))
                .and_then(|m| m.get("apiMessageId"))
                .and_then(|v| v.as_str());
            if index == 0 {
                external_id = message_id.map(|s| s.to_string());
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
            tracing::warn!(channel = %channel.uuid, error = %err, "clickatell send failed");
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
