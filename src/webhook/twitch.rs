use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::twitch::STREAM_ONLINE;
use crate::adapters::Platform;
use crate::events::{LiveEvent, LiveEventSender};
use crate::webhook::verify::TwitchVerifier;
use crate::webhook::{required_headers, MessageType, WebhookReply};

pub const MESSAGE_ID_HEADER: &str = "twitch-eventsub-message-id";
pub const MESSAGE_TIMESTAMP_HEADER: &str = "twitch-eventsub-message-timestamp";
pub const MESSAGE_SIGNATURE_HEADER: &str = "twitch-eventsub-message-signature";
pub const MESSAGE_TYPE_HEADER: &str = "twitch-eventsub-message-type";

/// EventSub webhook body
#[derive(Debug, Deserialize)]
pub struct EventSubEnvelope {
    pub subscription: EventSubSubscriptionInfo,
    /// Present on `webhook_callback_verification`
    #[serde(default)]
    pub challenge: Option<String>,
    /// Present on `notification`
    #[serde(default)]
    pub event: Option<Value>,
}

/// Subscription block of an EventSub delivery
#[derive(Debug, Deserialize)]
pub struct EventSubSubscriptionInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub subscription_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub condition: Value,
}

/// Handle one EventSub delivery.
///
/// Signature verification happens before the body is interpreted.
pub fn handle_delivery(
    verifier: &TwitchVerifier,
    live_events: &LiveEventSender,
    headers: &HeaderMap,
    body: &[u8],
) -> WebhookReply {
    let Some([message_id, timestamp, signature, message_type]) = required_headers(
        headers,
        [
            MESSAGE_ID_HEADER,
            MESSAGE_TIMESTAMP_HEADER,
            MESSAGE_SIGNATURE_HEADER,
            MESSAGE_TYPE_HEADER,
        ],
    ) else {
        warn!(platform = "twitch", "Webhook rejected, missing EventSub headers");
        return WebhookReply::status(StatusCode::BAD_REQUEST);
    };

    if !verifier.verify(message_id, timestamp, body, signature) {
        warn!(platform = "twitch", message_id, "Webhook rejected, bad signature");
        return WebhookReply::status(StatusCode::FORBIDDEN);
    }

    let message_type = MessageType::from_twitch(message_type);
    if let MessageType::Unknown(other) = &message_type {
        info!(platform = "twitch", message_id, message_type = %other, "Ignoring unknown message type");
        return WebhookReply::ok();
    }

    let envelope: EventSubEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(platform = "twitch", message_id, error = %e, "Webhook body is not a valid EventSub message");
            return WebhookReply::status(StatusCode::BAD_REQUEST);
        }
    };

    match message_type {
        MessageType::VerificationChallenge => match envelope.challenge {
            Some(challenge) => {
                info!(
                    platform = "twitch",
                    subscription_id = %envelope.subscription.id,
                    subscription_type = %envelope.subscription.subscription_type,
                    "Answering verification challenge"
                );
                WebhookReply::text(challenge)
            }
            None => {
                warn!(platform = "twitch", message_id, "Verification message without challenge");
                WebhookReply::status(StatusCode::BAD_REQUEST)
            }
        },
        MessageType::Revocation => {
            warn!(
                platform = "twitch",
                subscription_id = %envelope.subscription.id,
                subscription_type = %envelope.subscription.subscription_type,
                status = envelope.subscription.status.as_deref().unwrap_or("unknown"),
                condition = %envelope.subscription.condition,
                "Subscription revoked"
            );
            WebhookReply::ok()
        }
        MessageType::Notification => handle_notification(live_events, message_id, envelope),
        MessageType::Unknown(_) => WebhookReply::ok(),
    }
}

fn handle_notification(
    live_events: &LiveEventSender,
    message_id: &str,
    envelope: EventSubEnvelope,
) -> WebhookReply {
    if envelope.subscription.subscription_type != STREAM_ONLINE {
        debug!(
            platform = "twitch",
            subscription_type = %envelope.subscription.subscription_type,
            "Ignoring notification for unhandled subscription type"
        );
        return WebhookReply::ok();
    }

    let broadcaster_id = envelope
        .event
        .as_ref()
        .and_then(|event| event.get("broadcaster_user_id"))
        .and_then(Value::as_str);
    let Some(broadcaster_id) = broadcaster_id else {
        warn!(platform = "twitch", message_id, "stream.online event without broadcaster_user_id");
        return WebhookReply::status(StatusCode::BAD_REQUEST);
    };

    info!(platform = "twitch", broadcaster_id, "Broadcaster went live");
    if live_events
        .send(LiveEvent::new(Platform::Twitch, broadcaster_id, message_id))
        .is_err()
    {
        error!(platform = "twitch", broadcaster_id, "Notification worker is gone, dropping live event");
    }
    WebhookReply::ok()
}
