//! Twitch Helix and EventSub (webhook transport) client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::adapters::base::{NormalizedStreamData, Platform, StreamSource};
use crate::adapters::http_client::{HttpClient, HttpMethod};
use crate::auth::{OAuthClient, RefreshFailurePolicy, TokenFileStore, TokenKind, TokenManager};
use crate::config::PlatformCredentials;
use crate::error::{NotifierError, Result};

pub const TWITCH_AUTH_BASE: &str = "https://id.twitch.tv/oauth2";
pub const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// EventSub subscription type for "broadcaster went live"
pub const STREAM_ONLINE: &str = "stream.online";

/// Helix caps id/login filters at 100 values per request
const HELIX_MAX_IDS: usize = 100;

const THUMBNAIL_WIDTH: &str = "1280";
const THUMBNAIL_HEIGHT: &str = "720";

/// Base URLs the client talks to
#[derive(Debug, Clone)]
pub struct TwitchEndpoints {
    pub auth_base: String,
    pub helix_base: String,
}

impl Default for TwitchEndpoints {
    fn default() -> Self {
        Self {
            auth_base: TWITCH_AUTH_BASE.to_string(),
            helix_base: HELIX_BASE.to_string(),
        }
    }
}

/// Helix user object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

/// Helix stream object. Only returned while the broadcaster is live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HelixStream {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(rename = "type", default)]
    pub stream_type: String,
    #[serde(default)]
    pub started_at: Option<String>,
}

/// EventSub subscription as listed by Helix
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSubSubscription {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub subscription_type: String,
    pub version: String,
    #[serde(default)]
    pub condition: Value,
    #[serde(default)]
    pub transport: Value,
}

impl EventSubSubscription {
    /// Broadcaster id from the subscription condition, if any
    pub fn broadcaster_user_id(&self) -> Option<&str> {
        self.condition.get("broadcaster_user_id").and_then(Value::as_str)
    }

    /// Callback URL of a webhook transport
    pub fn callback(&self) -> Option<&str> {
        self.transport.get("callback").and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

/// Client for the Twitch API, owning the app and (optional) user token
pub struct TwitchClient {
    tokens: TokenManager,
    http_client: Arc<dyn HttpClient>,
    helix_base: String,
}

impl TwitchClient {
    /// Create a new client against the production endpoints
    pub fn new(
        credentials: &PlatformCredentials,
        token_dir: Option<&Path>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self::with_endpoints(credentials, token_dir, http_client, TwitchEndpoints::default())
    }

    /// Create a new client with custom base URLs
    pub fn with_endpoints(
        credentials: &PlatformCredentials,
        token_dir: Option<&Path>,
        http_client: Arc<dyn HttpClient>,
        endpoints: TwitchEndpoints,
    ) -> Self {
        let oauth = OAuthClient::new(
            "twitch",
            format!("{}/token", endpoints.auth_base),
            format!("{}/revoke", endpoints.auth_base),
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            http_client.clone(),
        );
        let store = token_dir.map(|dir| TokenFileStore::new(dir, "twitch"));

        Self {
            tokens: TokenManager::new("twitch", oauth, store, RefreshFailurePolicy::Propagate),
            http_client,
            helix_base: endpoints.helix_base,
        }
    }

    /// Load or fetch the app token and pick up a persisted user token.
    ///
    /// A missing user token is not an error; lookups then use the app token.
    pub async fn initialize(&self) -> Result<()> {
        self.tokens.initialize_app().await?;
        self.tokens.load_user().await;
        info!(platform = "twitch", "Twitch client initialized");
        Ok(())
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Token used for read endpoints
    async fn read_token_kind(&self) -> TokenKind {
        if self.tokens.has_token(TokenKind::User).await {
            TokenKind::User
        } else {
            TokenKind::App
        }
    }

    /// Make an authenticated Helix request.
    ///
    /// `endpoint` is the path plus query, e.g. `/users?id=1`. Returns `None`
    /// for `204 No Content` or an empty body.
    #[instrument(skip(self, body), level = "debug")]
    pub async fn request(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&Value>,
        token_kind: TokenKind,
    ) -> Result<Option<Value>> {
        let access_token = self.tokens.valid_access_token(token_kind).await?;

        let mut headers = HashMap::new();
        headers.insert(
            "Client-Id".to_string(),
            self.tokens.oauth().client_id().to_string(),
        );
        headers.insert("Authorization".to_string(), format!("Bearer {}", access_token));
        if body.is_some() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        let url = format!("{}{}", self.helix_base, endpoint);
        let response = self
            .http_client
            .send(method, &url, headers, body.map(Value::to_string))
            .await?;

        if !response.is_success() {
            warn!(
                platform = "twitch",
                status = response.status(),
                endpoint,
                "Helix request failed"
            );
            return Err(NotifierError::api_with_status(
                format!("Twitch {} {} failed", method, endpoint),
                response.status(),
                response.text(),
            ));
        }

        if response.status() == 204 || response.body().trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(response.json()?))
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        token_kind: TokenKind,
    ) -> Result<HelixPage<T>> {
        let value = self
            .request(endpoint, HttpMethod::GET, None, token_kind)
            .await?
            .ok_or_else(|| NotifierError::api(format!("Twitch {} returned no body", endpoint)))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_users(&self, key: &str, values: &[String]) -> Result<Vec<HelixUser>> {
        let kind = self.read_token_kind().await;
        let mut users = Vec::with_capacity(values.len());

        for chunk in values.chunks(HELIX_MAX_IDS) {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(chunk.iter().map(|v| (key, v.as_str())))
                .finish();
            let page: HelixPage<HelixUser> =
                self.get_page(&format!("/users?{}", query), kind).await?;
            users.extend(page.data);
        }

        Ok(users)
    }

    /// Look up users by id
    pub async fn get_users_by_id(&self, ids: &[String]) -> Result<Vec<HelixUser>> {
        self.get_users("id", ids).await
    }

    /// Look up users by login name
    pub async fn get_users_by_login(&self, logins: &[String]) -> Result<Vec<HelixUser>> {
        self.get_users("login", logins).await
    }

    /// The broadcaster's current stream, `None` while offline
    pub async fn get_stream(&self, user_id: &str) -> Result<Option<HelixStream>> {
        let kind = self.read_token_kind().await;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user_id", user_id)
            .finish();
        let page: HelixPage<HelixStream> =
            self.get_page(&format!("/streams?{}", query), kind).await?;
        Ok(page.data.into_iter().next())
    }

    /// All EventSub subscriptions owned by this application
    pub async fn list_subscriptions(&self) -> Result<Vec<EventSubSubscription>> {
        let mut subscriptions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let endpoint = match &cursor {
                Some(after) => format!(
                    "/eventsub/subscriptions?{}",
                    url::form_urlencoded::Serializer::new(String::new())
                        .append_pair("after", after)
                        .finish()
                ),
                None => "/eventsub/subscriptions".to_string(),
            };
            let page: HelixPage<EventSubSubscription> =
                self.get_page(&endpoint, TokenKind::App).await?;
            let page_len = page.data.len();
            subscriptions.extend(page.data);

            cursor = page
                .pagination
                .and_then(|p| p.cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() || page_len == 0 {
                break;
            }
        }

        debug!(platform = "twitch", count = subscriptions.len(), "Listed subscriptions");
        Ok(subscriptions)
    }

    /// Subscribe to `stream.online` for a broadcaster over the webhook transport
    pub async fn create_stream_online_subscription(
        &self,
        broadcaster_id: &str,
        callback: &str,
        secret: &str,
    ) -> Result<EventSubSubscription> {
        let body = json!({
            "type": STREAM_ONLINE,
            "version": "1",
            "condition": { "broadcaster_user_id": broadcaster_id },
            "transport": {
                "method": "webhook",
                "callback": callback,
                "secret": secret,
            }
        });

        let value = self
            .request("/eventsub/subscriptions", HttpMethod::POST, Some(&body), TokenKind::App)
            .await?
            .ok_or_else(|| NotifierError::api("Twitch subscription create returned no body"))?;
        let page: HelixPage<EventSubSubscription> = serde_json::from_value(value)?;
        let subscription = page
            .data
            .into_iter()
            .next()
            .ok_or_else(|| NotifierError::api("Twitch subscription create returned no data"))?;

        info!(
            platform = "twitch",
            broadcaster_id,
            subscription_id = %subscription.id,
            "Created stream.online subscription"
        );
        Ok(subscription)
    }

    /// Delete an EventSub subscription
    pub async fn delete_subscription(&self, id: &str) -> Result<()> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id", id)
            .finish();
        self.request(
            &format!("/eventsub/subscriptions?{}", query),
            HttpMethod::DELETE,
            None,
            TokenKind::App,
        )
        .await?;
        info!(platform = "twitch", subscription_id = id, "Deleted subscription");
        Ok(())
    }
}

/// Fill in the `{width}x{height}` template of a Helix thumbnail URL
pub fn thumbnail_url(template: &str) -> String {
    template
        .replace("{width}", THUMBNAIL_WIDTH)
        .replace("{height}", THUMBNAIL_HEIGHT)
}

#[async_trait]
impl StreamSource for TwitchClient {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn fetch_stream_data(&self, broadcaster_id: &str) -> Result<Option<NormalizedStreamData>> {
        let Some(stream) = self.get_stream(broadcaster_id).await? else {
            debug!(platform = "twitch", broadcaster_id, "Stream not reported live yet");
            return Ok(None);
        };

        let user = self
            .get_users_by_id(&[broadcaster_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NotifierError::api(format!("Twitch user {} not found", broadcaster_id)))?;

        let username = if user.display_name.is_empty() {
            user.login.clone()
        } else {
            user.display_name
        };

        Ok(Some(NormalizedStreamData {
            stream_title: stream.title,
            stream_category: stream.game_name,
            username,
            stream_url: format!("https://twitch.tv/{}", user.login),
            stream_thumbnail: Some(thumbnail_url(&stream.thumbnail_url))
                .filter(|url| !url.is_empty()),
            user_thumbnail: Some(user.profile_image_url).filter(|url| !url.is_empty()),
        }))
    }
}
