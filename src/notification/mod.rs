//! Live event enrichment and delivery.
//!
//! A worker task drains the live event channel and spawns one pipeline run
//! per event: fetch stream metadata with a fixed-delay retry, then post the
//! announcement to Discord. Failures are logged and the event is dropped.

pub mod discord;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::{NormalizedStreamData, Platform, StreamSource};
use crate::common::retry::{with_retry_policy, RetryPolicy};
use crate::error::NotifierError;
use crate::events::{LiveEvent, LiveEventReceiver};

pub use discord::DiscordNotifier;

/// Fetch stream metadata, retrying "not live yet", "not found" and transport
/// failures alike. Returns `None` once the policy is exhausted.
pub async fn fetch_stream_with_retry(
    source: &dyn StreamSource,
    broadcaster_id: &str,
    policy: RetryPolicy,
) -> Option<NormalizedStreamData> {
    let platform = source.platform();
    let context = format!("{} stream lookup for {}", platform, broadcaster_id);

    let result = with_retry_policy(
        |attempt| async move {
            debug!(platform = %platform, broadcaster_id, attempt, "Fetching stream data");
            match source.fetch_stream_data(broadcaster_id).await {
                Ok(Some(data)) => Ok(data),
                Ok(None) => Err(NotifierError::api(format!(
                    "{} not reported live yet",
                    broadcaster_id
                ))),
                Err(e) => Err(e),
            }
        },
        policy,
        &context,
    )
    .await;

    result.ok()
}

/// Everything needed to turn a live event into a Discord post
pub struct NotificationPipeline {
    sources: HashMap<Platform, Arc<dyn StreamSource>>,
    discord: DiscordNotifier,
    policy: RetryPolicy,
}

impl NotificationPipeline {
    pub fn new(discord: DiscordNotifier) -> Self {
        Self {
            sources: HashMap::new(),
            discord,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the enrichment retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register the metadata source for a platform
    pub fn with_source(mut self, source: Arc<dyn StreamSource>) -> Self {
        self.sources.insert(source.platform(), source);
        self
    }

    /// Run the pipeline for one event
    pub async fn handle(&self, event: LiveEvent) {
        let platform = event.platform();
        let broadcaster_id = event.broadcaster_id();

        let Some(source) = self.sources.get(&platform) else {
            warn!(platform = %platform, broadcaster_id, "No client for platform, dropping live event");
            return;
        };

        let Some(data) = fetch_stream_with_retry(source.as_ref(), broadcaster_id, self.policy).await
        else {
            error!(
                platform = %platform,
                broadcaster_id,
                attempts = self.policy.max_attempts,
                "Giving up on live notification"
            );
            return;
        };

        if let Err(e) = self.discord.send(platform, &data).await {
            error!(platform = %platform, broadcaster_id, error = %e, "Failed to deliver notification");
        }
    }

    /// Drain the channel until every sender is dropped, handling each event
    /// on its own task
    pub fn spawn_worker(self: Arc<Self>, mut receiver: LiveEventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Notification worker started");
            while let Some(event) = receiver.recv().await {
                debug!(
                    platform = %event.platform(),
                    broadcaster_id = event.broadcaster_id(),
                    message_id = event.message_id(),
                    "Live event received"
                );
                let pipeline = Arc::clone(&self);
                tokio::spawn(async move { pipeline.handle(event).await });
            }
            info!("Notification worker stopped");
        })
    }
}
