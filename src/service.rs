use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::kick::{KickEndpoints, LIVESTREAM_STATUS_UPDATED};
use crate::adapters::twitch::{TwitchEndpoints, STREAM_ONLINE};
use crate::adapters::{HttpClient, KickClient, Platform, ReqwestHttpClient, StreamSource, TwitchClient};
use crate::api::AppState;
use crate::auth::PkceStateStore;
use crate::channels::load_channels;
use crate::common::{RetryPolicy, SharedClient};
use crate::config::Config;
use crate::error::Result;
use crate::events::live_event_channel;
use crate::notification::{DiscordNotifier, NotificationPipeline};
use crate::webhook::TwitchVerifier;

/// EventSub statuses of a subscription that is, or is about to be, delivering
const HEALTHY_TWITCH_STATUSES: [&str; 2] = ["enabled", "webhook_callback_verification_pending"];

/// Owns the shared platform clients and wires them into the HTTP state and
/// the notification worker
pub struct NotifierService {
    config: Arc<Config>,
    http_client: Arc<dyn HttpClient>,
    twitch: Arc<SharedClient<TwitchClient>>,
    kick: Arc<SharedClient<KickClient>>,
    twitch_endpoints: TwitchEndpoints,
    kick_endpoints: KickEndpoints,
    retry_policy: RetryPolicy,
}

impl NotifierService {
    /// Create a new service talking to the production APIs
    pub fn new(config: Config) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    /// Create a new service with a custom HTTP client
    pub fn with_http_client(config: Config, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
            twitch: Arc::new(SharedClient::new("twitch")),
            kick: Arc::new(SharedClient::new("kick")),
            twitch_endpoints: TwitchEndpoints::default(),
            kick_endpoints: KickEndpoints::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Point the platform clients at other base URLs
    pub fn with_endpoints(mut self, twitch: TwitchEndpoints, kick: KickEndpoints) -> Self {
        self.twitch_endpoints = twitch;
        self.kick_endpoints = kick;
        self
    }

    /// Override the enrichment retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The shared Twitch client, initializing it on first use.
    /// `None` when Twitch is not configured.
    pub async fn twitch_client(&self) -> Result<Option<Arc<TwitchClient>>> {
        let Some(credentials) = &self.config.twitch else {
            return Ok(None);
        };
        let client = self
            .twitch
            .get_or_init(|| async {
                let client = TwitchClient::with_endpoints(
                    credentials,
                    self.config.token_dir.as_deref(),
                    self.http_client.clone(),
                    self.twitch_endpoints.clone(),
                );
                client.initialize().await?;
                Ok(client)
            })
            .await?;
        Ok(Some(client))
    }

    /// The shared Kick client, initializing it on first use.
    /// `None` when Kick is not configured.
    pub async fn kick_client(&self) -> Result<Option<Arc<KickClient>>> {
        let Some(credentials) = &self.config.kick else {
            return Ok(None);
        };
        let client = self
            .kick
            .get_or_init(|| async {
                let client = KickClient::with_endpoints(
                    credentials,
                    self.config.token_dir.as_deref(),
                    self.http_client.clone(),
                    self.kick_endpoints.clone(),
                );
                client.initialize().await?;
                Ok(client)
            })
            .await?;
        Ok(Some(client))
    }

    /// Initialize the configured clients, start the notification worker and
    /// build the HTTP state.
    ///
    /// The worker stops once the returned state (and every clone of it) is
    /// dropped.
    pub async fn start(&self) -> Result<(AppState, JoinHandle<()>)> {
        let discord = DiscordNotifier::new(self.http_client.clone(), self.config.discord.clone());
        let mut pipeline = NotificationPipeline::new(discord).with_policy(self.retry_policy);

        if let Some(twitch) = self.twitch_client().await? {
            pipeline = pipeline.with_source(twitch as Arc<dyn StreamSource>);
        }
        if let Some(kick) = self.kick_client().await? {
            pipeline = pipeline.with_source(kick as Arc<dyn StreamSource>);
        }

        let (live_events, receiver) = live_event_channel();
        let worker = Arc::new(pipeline).spawn_worker(receiver);

        let state = AppState {
            config: self.config.clone(),
            twitch: self.twitch.clone(),
            kick: self.kick.clone(),
            twitch_verifier: TwitchVerifier::new(self.config.webhook_secret.clone()),
            live_events,
            pkce: PkceStateStore::default(),
        };

        Ok((state, worker))
    }

    /// Bring platform subscriptions in line with the tracked channel files.
    ///
    /// Failures are logged per platform and per channel and never abort
    /// startup.
    pub async fn sync_subscriptions(&self) {
        for platform in self.config.platforms() {
            let result = match platform {
                Platform::Twitch => self.sync_twitch().await,
                Platform::Kick => self.sync_kick().await,
            };
            if let Err(e) = result {
                error!(platform = %platform, error = %e, "Subscription sync failed");
            }
        }
    }

    async fn sync_twitch(&self) -> Result<()> {
        let Some(twitch) = self.twitch_client().await? else {
            return Ok(());
        };
        let logins = load_channels(&self.config.channels_dir, Platform::Twitch).await?;
        let callback = self.config.event_callback_url(Platform::Twitch);

        let users = if logins.is_empty() {
            Vec::new()
        } else {
            twitch.get_users_by_login(&logins).await?
        };
        for login in &logins {
            if !users.iter().any(|u| u.login.eq_ignore_ascii_case(login)) {
                warn!(platform = "twitch", login = %login, "Tracked channel not found");
            }
        }
        let tracked: HashSet<&str> = users.iter().map(|u| u.id.as_str()).collect();

        let mut subscribed = HashSet::new();
        for subscription in twitch.list_subscriptions().await? {
            if subscription.subscription_type != STREAM_ONLINE
                || subscription.callback() != Some(callback.as_str())
            {
                continue;
            }
            let broadcaster = subscription.broadcaster_user_id().unwrap_or_default().to_string();
            let healthy = HEALTHY_TWITCH_STATUSES.contains(&subscription.status.as_str());

            if healthy && tracked.contains(broadcaster.as_str()) {
                subscribed.insert(broadcaster);
                continue;
            }

            info!(
                platform = "twitch",
                subscription_id = %subscription.id,
                broadcaster_id = %broadcaster,
                status = %subscription.status,
                "Removing stale subscription"
            );
            if let Err(e) = twitch.delete_subscription(&subscription.id).await {
                warn!(platform = "twitch", subscription_id = %subscription.id, error = %e, "Failed to delete subscription");
            }
        }

        for user in &users {
            if subscribed.contains(&user.id) {
                continue;
            }
            if let Err(e) = twitch
                .create_stream_online_subscription(&user.id, &callback, &self.config.webhook_secret)
                .await
            {
                error!(platform = "twitch", login = %user.login, error = %e, "Failed to subscribe");
            }
        }

        info!(platform = "twitch", tracked = users.len(), "Subscriptions synced");
        Ok(())
    }

    async fn sync_kick(&self) -> Result<()> {
        let Some(kick) = self.kick_client().await? else {
            return Ok(());
        };
        let slugs = load_channels(&self.config.channels_dir, Platform::Kick).await?;

        let mut tracked = HashSet::new();
        for slug in &slugs {
            match kick.get_channel_by_slug(slug).await {
                Ok(channel) => {
                    tracked.insert(channel.broadcaster_user_id);
                }
                Err(e) => warn!(platform = "kick", slug = %slug, error = %e, "Tracked channel not found"),
            }
        }

        let mut subscribed = HashSet::new();
        for subscription in kick.list_subscriptions().await? {
            if subscription.event != LIVESTREAM_STATUS_UPDATED {
                continue;
            }
            if tracked.contains(&subscription.broadcaster_user_id) {
                subscribed.insert(subscription.broadcaster_user_id);
                continue;
            }

            info!(
                platform = "kick",
                subscription_id = %subscription.id,
                broadcaster_id = %subscription.broadcaster_user_id,
                "Removing stale subscription"
            );
            if let Err(e) = kick.delete_subscription(&subscription.id).await {
                warn!(platform = "kick", subscription_id = %subscription.id, error = %e, "Failed to delete subscription");
            }
        }

        for broadcaster_id in tracked.difference(&subscribed) {
            if let Err(e) = kick.create_livestream_subscription(broadcaster_id).await {
                error!(platform = "kick", broadcaster_id = %broadcaster_id, error = %e, "Failed to subscribe");
            }
        }

        info!(
            platform = "kick",
            tracked = tracked.len(),
            webhook_url = %self.config.event_callback_url(Platform::Kick),
            "Subscriptions synced, the Kick app webhook URL must point at webhook_url"
        );
        Ok(())
    }
}
