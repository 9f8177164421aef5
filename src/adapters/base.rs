//! Platform-agnostic types shared by the Twitch and Kick clients

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Streaming platform a notification originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Kick,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Kick => "kick",
        }
    }

    /// Human readable platform name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitch => "Twitch",
            Platform::Kick => "Kick",
        }
    }

    /// Brand color used for the Discord embed
    pub fn embed_color(&self) -> u32 {
        match self {
            Platform::Twitch => 0x6441A4,
            Platform::Kick => 0x53FC18,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream metadata as the notification formatter sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedStreamData {
    pub stream_title: String,
    pub stream_category: String,
    pub username: String,
    pub stream_url: String,
    pub stream_thumbnail: Option<String>,
    pub user_thumbnail: Option<String>,
}

/// Source of live stream metadata for the notification pipeline
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Platform this source talks to
    fn platform(&self) -> Platform;

    /// Fetch stream and user data for a broadcaster.
    ///
    /// `Ok(None)` means the broadcaster is not (yet) reported live.
    async fn fetch_stream_data(&self, broadcaster_id: &str) -> Result<Option<NormalizedStreamData>>;
}
