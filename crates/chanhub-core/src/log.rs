//! Channel-log accumulation and secret redaction.
//!
//! A `ChannelLog` is exclusively owned by one pipeline invocation (one
//! webhook, or one `send` call) until it is handed off to the Backend.
//! Redaction runs once, right before that hand-off, never in place while the
//! log is still being written to.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

const REDACTED_SENTINEL: &str = "********";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    MsgReceive,
    MsgStatus,
    MsgSend,
    EventReceive,
}

/// One HTTP request/response exchange captured during a pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTrace {
    pub request_line: String,
    pub request_body: String,
    pub response_line: String,
    pub response_body: String,
    pub elapsed: Duration,
}

/// A structured, classified failure attached to a log, distinct from the
/// `ChannelError` that may have short-circuited the pipeline: this is the
/// persisted record of what the provider said, kept alongside the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogError {
    pub code: String,
    pub external_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelLog {
    pub channel: Uuid,
    pub log_type: LogType,
    pub traces: Vec<HttpTrace>,
    pub errors: Vec<LogError>,
    pub redaction_values: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
}

impl ChannelLog {
    pub fn new(channel: Uuid, log_type: LogType, redaction_values: Vec<String>) -> Self {
        Self {
            channel,
            log_type,
            traces: Vec::new(),
            errors: Vec::new(),
            redaction_values,
            created_on: OffsetDateTime::now_utc(),
        }
    }

    pub fn push_trace(&mut self, trace: HttpTrace) {
        self.traces.push(trace);
    }

    pub fn push_error(&mut self, error: LogError) {
        self.errors.push(error);
    }

    /// Replaces every configured redaction value with a fixed sentinel in
    /// every trace's request/response lines and bodies, and in every error's
    /// free text. Idempotent, and safe to call on a log with no redaction
    /// values configured (a no-op).
    pub fn redact(&mut self) {
        if self.redaction_values.is_empty() {
            return;
        }
        for trace in &mut self.traces {
            trace.request_line = redact_str(&trace.request_line, &self.redaction_values);
            trace.request_body = redact_str(&trace.request_body, &self.redaction_values);
            trace.response_line = redact_str(&trace.response_line, &self.redaction_values);
            trace.response_body = redact_str(&trace.response_body, &self.redaction_values);
        }
        for error in &mut self.errors {
            error.message = redact_str(&error.message, &self.redaction_values);
        }
    }
}

fn redact_str(input: &str, values: &[String]) -> String {
    let mut out = input.to_string();
    for value in values {
        if value.is_empty() {
            continue;
        }
        out = out.replace(value.as_str(), REDACTED_SENTINEL);
    }
    out
}
