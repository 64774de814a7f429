//! Maps provider-specific status reports to canonical `StatusUpdate`s and
//! hands them to the Backend. Matches spec.md C9 steps 1-6; step 1-2
//! (decode, unknown-code policy) live in the adapter's `decode_status`
//! since both the field names and the ignore-vs-400 choice are
//! provider-declared. This module owns steps 3-6: correlating the target,
//! attaching any provider error, emitting a stop-contact event, and handing
//! the result to the Backend under its terminal-state rule.

use crate::handler::{ChannelHandler, StatusOutcome, WebhookResponse};
use chanhub_core::prelude::*;
use uuid::Uuid;

/// Prefers an explicit internal id over an external id, as spec.md §4.9 step
/// 3 directs: "prefer explicit `id` query parameter... else correlate by
/// external id".
pub fn correlate(explicit_internal_id: Option<Uuid>, external_id: Option<&str>) -> Option<StatusTarget> {
    if let Some(id) = explicit_internal_id {
        return Some(StatusTarget::InternalId(id));
    }
    external_id.map(|id| StatusTarget::ExternalId(id.to_string()))
}

/// Runs steps 3-6 against an already-decoded `StatusOutcome` and reports the
/// webhook response the adapter declared.
pub async fn handle(
    backend: &dyn Backend,
    handler: &dyn ChannelHandler,
    channel: &Channel,
    outcome: StatusOutcome,
    log: &mut ChannelLog,
) -> WebhookResponse {
    match outcome {
        StatusOutcome::Ignored { response } => response,
        StatusOutcome::Update {
            target,
            status,
            new_external_id,
            urn_update,
            error,
            stop_event,
            response,
        } => {
            if let Some(error) = error {
                log.push_error(error);
            }

            let mut update = StatusUpdate {
                channel: channel.uuid,
                target,
                status,
                created_on: time::OffsetDateTime::now_utc(),
                new_external_id: None,
                urn_update,
            };
            if let Some(new_external_id) = new_external_id {
                update = update.with_new_external_id(new_external_id);
            }
            if let Err(err) = backend.write_status_update(update, log).await {
                tracing::warn!(channel = %channel.uuid, error = %err, "backend write_status_update failed");
            }

            if let Some(stop_event) = stop_event {
                if let Err(err) = backend.write_channel_event(stop_event, log).await {
                    tracing::warn!(channel = %channel.uuid, error = %err, "backend write_channel_event failed");
                }
            }

            tracing::info!(
                channel = %channel.uuid,
                provider = handler.channel_name(),
                status = status.code(),
                "status update applied"
            );
            response
        }
    }
}
