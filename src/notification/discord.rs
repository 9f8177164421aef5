use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::{HttpClient, NormalizedStreamData, Platform};
use crate::config::DiscordConfig;
use crate::error::{NotifierError, Result};

/// Discord rejects embed fields with an empty value
const UNKNOWN_CATEGORY: &str = "Unknown";

/// Posts live announcements to a Discord webhook
pub struct DiscordNotifier {
    http_client: Arc<dyn HttpClient>,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(http_client: Arc<dyn HttpClient>, config: DiscordConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Build the webhook payload for a live stream
    pub fn build_payload(&self, platform: Platform, data: &NormalizedStreamData) -> Value {
        let category = if data.stream_category.is_empty() {
            UNKNOWN_CATEGORY
        } else {
            data.stream_category.as_str()
        };
        let title = if data.stream_title.is_empty() {
            format!("{} is live", data.username)
        } else {
            data.stream_title.clone()
        };

        let mut author = json!({ "name": data.username });
        if let Some(icon) = &data.user_thumbnail {
            author["icon_url"] = json!(icon);
        }

        let mut embed = json!({
            "title": title,
            "description": format!("{} is now live on {}", data.username, platform.display_name()),
            "fields": [{ "name": "Game", "value": category, "inline": false }],
            "author": author,
            "url": data.stream_url,
            "timestamp": Utc::now().to_rfc3339(),
            "color": platform.embed_color(),
        });
        if let Some(thumbnail) = &data.stream_thumbnail {
            embed["image"] = json!({ "url": thumbnail });
        }

        let mut payload = json!({
            "content": format!(
                "{} is live on {}! {}",
                data.username,
                platform.display_name(),
                data.stream_url
            ),
            "embeds": [embed],
            "username": self.config.username,
        });
        if let Some(avatar) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar);
        }
        payload
    }

    /// Post one announcement. Single shot, never retried.
    pub async fn send(&self, platform: Platform, data: &NormalizedStreamData) -> Result<()> {
        let payload = self.build_payload(platform, data);
        let response = self
            .http_client
            .post_json(&self.config.webhook_url, HashMap::new(), &payload)
            .await?;

        if !response.is_success() {
            error!(
                platform = %platform,
                status = response.status(),
                body = response.body(),
                "Discord rejected notification"
            );
            return Err(NotifierError::api_with_status(
                "Discord webhook post failed",
                response.status(),
                response.text(),
            ));
        }

        info!(platform = %platform, username = %data.username, "Posted live notification");
        Ok(())
    }
}
