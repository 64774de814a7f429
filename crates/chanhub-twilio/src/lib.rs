//! Twilio channel handler: HMAC-SHA1-signed form webhooks, Basic-auth POST
//! sends, stop-contact detection on error code 21610.

use async_trait::async_trait;
use chanhub_core::prelude::*;
use chanhub_pipeline::prelude::*;

const CHANNEL_TYPE: &str = "t";
const CHANNEL_NAME: &str = "Twilio";
const STOP_ERROR_CODE: &str = "21610";

const ROUTES: &[RouteSpec] = &[
    RouteSpec { method: "POST", action: "receive" },
    RouteSpec { method: "POST", action: "status" },
];

pub struct TwilioHandler;

#[derive(serde::Deserialize)]
struct ReceiveBody {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "To")]
    #[allow(dead_code)]
    to: String,
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "MessageSid")]
    message_sid: String,
}

#[derive(serde::Deserialize)]
struct StatusBody {
    #[serde(rename = "MessageSid")]
    message_sid: String,
    #[serde(rename = "MessageStatus")]
    message_status: String,
    #[serde(rename = "ErrorCode")]
    error_code: Option<String>,
    #[serde(rename = "To")]
    to: Option<String>,
}

fn map_status(message_status: &str) -> Option<Status> {
    match message_status {
        "accepted" | "queued" => Some(Status::Queued),
        "sending" => Some(Status::Wired),
        "sent" => Some(Status::Sent),
        "delivered" => Some(Status::Delivered),
        "read" => Some(Status::Read),
        "undelivered" | "failed" | "canceled" => Some(Status::Failed),
        _ => None,
    }
}

#[async_trait]
impl ChannelHandler for TwilioHandler {
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
        if let Some(token) = channel.config_str("auth_token") {
            values.push(token.to_string());
            if let Some(sid) = channel.config_str("account_sid") {
                values.push(chanhub_core::auth::basic_auth_header(sid, token));
            }
        }
        values
    }

    fn requires_signature(&self, _action: &str) -> bool {
        true
    }

    fn verify_signature(
        &self,
        channel: &Channel,
        request_url: &str,
        forwarded_path: Option<&str>,
        raw: &RawRequest,
        signature_header: Option<&str>,
    ) -> Result<(), ChannelError> {
        let signature = signature_header.ok_or(ChannelError::SignatureMissing)?;
        let auth_token = channel.config_str_required("auth_token")?;
        let params = to_param_map(raw)?;

        let url = match forwarded_path {
            Some(path) => rewrite_path(request_url, path),
            None => request_url.to_string(),
        };

        if chanhub_core::auth::verify(&url, &params, auth_token, signature) {
            Ok(())
        } else {
            Err(ChannelError::SignatureInvalid)
        }
    }

    async fn decode_receive(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<ReceivedMsg, ChannelError> {
        let body: ReceiveBody = decode(
            raw,
            &["From", "To", "Body", "MessageSid"],
        )?;
        let urn = parse_urn(&body.from, &channel.country)?;
        Ok(ReceivedMsg {
            msg: MsgIn::new(channel.uuid, urn, body.body, body.message_sid),
            events: Vec::new(),
        })
    }

    fn write_msg_success_response(&self, _internal_id: uuid::Uuid) -> WebhookResponse {
        WebhookResponse::new(
            200,
            "text/xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#,
        )
    }

    async fn decode_status(
        &self,
        channel: &Channel,
        raw: &RawRequest,
        _log: &mut ChannelLog,
    ) -> Result<StatusOutcome, ChannelError> {
        let body: StatusBody = decode(raw, &["MessageSid", "MessageStatus"])?;

        let is_stop = body.error_code.as_deref() == Some(STOP_ERROR_CODE);
        let status = if is_stop {
            Status::Failed
        } else {
            match map_status(&body.message_status) {
                Some(status) => status,
                None => {
                    return Ok(StatusOutcome::Ignored {
                        response: WebhookResponse::plain(200, "ignoring unknown status report"),
                    })
                }
            }
        };

        let error = body.error_code.as_ref().map(|code| LogError {
            code: "external-error".to_string(),
            external_code: Some(code.clone()),
            message: format!("twilio error code {code}"),
        });

        let stop_event = if is_stop {
            match body.to.as_deref() {
                Some(to) => match parse_urn(to, &channel.country) {
                    Ok(urn) => Some(ChannelEvent::new(
                        channel.uuid,
                        urn,
                        ChannelEventType::StopContact,
                    )),
                    Err(_) => None,
                },
                None => None,
            }
        } else {
            None
        };

        Ok(StatusOutcome::Update {
            target: crate::correlate_by_sid(&body.message_sid),
            status,
            new_external_id: None,
            urn_update: None,
            error,
            stop_event,
            response: WebhookResponse::json(200, format!(r#"{{"status":"{}"}}"#, status.code())),
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

/// The status webhook's stop event is keyed on the channel UUID like every
/// other write; the pipeline fills it in before handing the event to the
/// Backend, so the placeholder `Uuid::nil()` here never reaches storage.
/// Twilio's `MessageSid` is the only correlation key a status callback
/// carries — there is no internal id query parameter for this provider.
fn correlate_by_sid(sid: &str) -> StatusTarget {
    chanhub_pipeline::status::correlate(None, Some(sid)).expect("external id always present")
}

fn rewrite_path(request_url: &str, forwarded_path: &str) -> String {
    match request_url.find("://").and_then(|scheme_end| {
        request_url[scheme_end + 3..]
            .find('/')
            .map(|i| scheme_end + 3 + i)
    }) {
        Some(path_start) => format!("{}{}", &request_url[..path_start], forwarded_path),
        None => request_url.to_string(),
    }
}

async fn send_message(
    ctx: &SendContext<'_>,
    channel: &Channel,
    msg: &MsgOut,
    log: &mut ChannelLog,
) -> StatusUpdate {
    let result: Result<StatusUpdate, ChannelError> = async {
        let account_sid = channel.config_str_required("account_sid")?;
        let auth_token = channel.config_str_required("auth_token")?;
        let base_url = channel
            .config_str("base_url")
            .unwrap_or("https://api.twilio.com")
            .to_string();
        let from = channel.address.clone();

        let text = chanhub_core::gsm7::replace_substitutions(&msg.text);
        let opts = ComposeOptions {
            max_length: 1600,
            channel_has_native_media: true,
            max_native_attachments: 10,
        };
        let parts = compose(&text, &msg.attachments, &opts);

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            base_url.trim_end_matches('/'),
            account_sid
        );

        let mut external_id: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let mut form: Vec<(&str, &str)> = vec![
                ("To", msg.urn.path.as_str()),
                ("From", from.as_str()),
                ("Body", part.text.as_str()),
            ];
            for media_url in &part.attachment_urls {
                form.push(("MediaUrl", media_url.as_str()));
            }

            let started = std::time::Instant::now();
            let response = ctx
                .http
                .post(&url)
                .basic_auth(account_sid, Some(auth_token))
                .form(&form)
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
                    "twilio returned {status_code}"
                )));
            }
            if !status_code.is_success() {
                return Err(ChannelError::ResponseStatus {
                    status: status_code.as_u16(),
                    body: body_text,
                });
            }

            let parsed: serde_json::Value = serde_json::from_str(&body_text)
                .map_err(|_| ChannelError::ResponseValueMissing { field: "sid".to_string() })?;
            let sid = parsed.get("sid").and_then(|v| v.as_str());
            if index == 0 {
                external_id = sid.map(|s| s.to_string());
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
            tracing::warn!(channel = %channel.uuid, error = %err, "twilio send failed");
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
