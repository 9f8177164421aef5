use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::adapters::Platform;

/// A broadcaster went live, as reported by a verified webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    platform: Platform,
    broadcaster_id: String,
    /// Delivery id of the webhook message that reported it
    message_id: String,
    received_at: DateTime<Utc>,
}

impl LiveEvent {
    pub fn new(platform: Platform, broadcaster_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            platform,
            broadcaster_id: broadcaster_id.into(),
            message_id: message_id.into(),
            received_at: Utc::now(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn broadcaster_id(&self) -> &str {
        &self.broadcaster_id
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn received_at(&self) -> &DateTime<Utc> {
        &self.received_at
    }
}

pub type LiveEventSender = mpsc::UnboundedSender<LiveEvent>;
pub type LiveEventReceiver = mpsc::UnboundedReceiver<LiveEvent>;

/// Channel carrying live events from the webhook handlers to the
/// notification worker. Sending never blocks the HTTP path.
pub fn live_event_channel() -> (LiveEventSender, LiveEventReceiver) {
    mpsc::unbounded_channel()
}
