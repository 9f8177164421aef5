//! Inbound webhook handling: header checks, signature verification and
//! message-type dispatch for Twitch EventSub and Kick events.
//!
//! Handlers answer with a bare status code (plus the challenge for Twitch
//! verification). A live event is handed to the notification worker and never
//! delays the response.

pub mod kick;
pub mod twitch;
pub mod verify;

use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};

pub use verify::{KickVerifier, TwitchVerifier};

/// Kind of webhook delivery, parsed once from the type header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Twitch proving we own the callback URL
    VerificationChallenge,
    /// Twitch revoked a subscription
    Revocation,
    /// An event we subscribed to
    Notification,
    Unknown(String),
}

impl MessageType {
    /// Parse a `Twitch-Eventsub-Message-Type` header value
    pub fn from_twitch(value: &str) -> Self {
        match value {
            "webhook_callback_verification" => Self::VerificationChallenge,
            "revocation" => Self::Revocation,
            "notification" => Self::Notification,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Parse a `Kick-Event-Type` header value
    pub fn from_kick(value: &str) -> Self {
        match value {
            crate::adapters::kick::LIVESTREAM_STATUS_UPDATED => Self::Notification,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Reply sent back to the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReply {
    pub status: StatusCode,
    pub body: String,
}

impl WebhookReply {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

impl IntoResponse for WebhookReply {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

/// Values of the named headers, or `None` if any is missing or not UTF-8
pub(crate) fn required_headers<'a, const N: usize>(
    headers: &'a HeaderMap,
    names: [&str; N],
) -> Option<[&'a str; N]> {
    let mut values = [""; N];
    for (slot, name) in values.iter_mut().zip(names) {
        *slot = headers.get(name)?.to_str().ok()?;
    }
    Some(values)
}
