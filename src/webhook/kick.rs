use http::{HeaderMap, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::{KickClient, Platform};
use crate::common::json_path::{first_bool, first_id, first_str};
use crate::events::{LiveEvent, LiveEventSender};
use crate::webhook::{required_headers, MessageType, WebhookReply};

pub const MESSAGE_ID_HEADER: &str = "kick-event-message-id";
pub const MESSAGE_TIMESTAMP_HEADER: &str = "kick-event-message-timestamp";
pub const SIGNATURE_HEADER: &str = "kick-event-signature";
pub const EVENT_TYPE_HEADER: &str = "kick-event-type";

/// Handle one Kick webhook delivery.
///
/// Without a loaded public key every delivery fails verification.
pub fn handle_delivery(
    kick: &KickClient,
    live_events: &LiveEventSender,
    headers: &HeaderMap,
    body: &[u8],
) -> WebhookReply {
    let Some([message_id, timestamp, signature, event_type]) = required_headers(
        headers,
        [
            MESSAGE_ID_HEADER,
            MESSAGE_TIMESTAMP_HEADER,
            SIGNATURE_HEADER,
            EVENT_TYPE_HEADER,
        ],
    ) else {
        warn!(platform = "kick", "Webhook rejected, missing Kick event headers");
        return WebhookReply::status(StatusCode::BAD_REQUEST);
    };

    let Some(verifier) = kick.verifier() else {
        error!(platform = "kick", message_id, "Webhook rejected, no public key loaded");
        return WebhookReply::status(StatusCode::FORBIDDEN);
    };
    if !verifier.verify(message_id, timestamp, body, signature) {
        warn!(platform = "kick", message_id, "Webhook rejected, bad signature");
        return WebhookReply::status(StatusCode::FORBIDDEN);
    }

    match MessageType::from_kick(event_type) {
        MessageType::Notification => {}
        MessageType::Unknown(other) => {
            info!(platform = "kick", message_id, event_type = %other, "Ignoring unhandled event type");
            return WebhookReply::ok();
        }
        // Kick has no challenge or revocation deliveries
        other => {
            debug!(platform = "kick", message_id, message_type = ?other, "Ignoring delivery");
            return WebhookReply::ok();
        }
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(platform = "kick", message_id, error = %e, "Webhook body is not valid JSON");
            return WebhookReply::status(StatusCode::BAD_REQUEST);
        }
    };

    let Some(broadcaster_id) = first_id(&payload, &["broadcaster.user_id", "broadcaster_user_id"]) else {
        warn!(platform = "kick", message_id, "Status update without broadcaster id");
        return WebhookReply::status(StatusCode::BAD_REQUEST);
    };
    if let Some(slug) = first_str(&payload, &["broadcaster.channel_slug", "broadcaster.username"]) {
        kick.remember_slug(&broadcaster_id, &slug);
    }

    if first_bool(&payload, &["is_live"]) != Some(true) {
        info!(platform = "kick", broadcaster_id = %broadcaster_id, "Broadcaster went offline");
        return WebhookReply::ok();
    }

    info!(platform = "kick", broadcaster_id = %broadcaster_id, "Broadcaster went live");
    if live_events
        .send(LiveEvent::new(Platform::Kick, broadcaster_id.as_str(), message_id))
        .is_err()
    {
        error!(platform = "kick", broadcaster_id = %broadcaster_id, "Notification worker is gone, dropping live event");
    }
    WebhookReply::ok()
}
