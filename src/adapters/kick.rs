//! Kick public API client.
//!
//! Kick's response shapes differ between the documented `public/v1` API and
//! the older site API used as a fallback, and have changed over time. Values
//! are therefore read from raw JSON through a list of candidate paths and
//! checked once at this boundary.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::base::{NormalizedStreamData, Platform, StreamSource};
use crate::adapters::http_client::{HttpClient, HttpMethod};
use crate::auth::{OAuthClient, RefreshFailurePolicy, TokenFileStore, TokenKind, TokenManager};
use crate::common::json_path::{first_bool, first_id, first_str, lookup};
use crate::config::PlatformCredentials;
use crate::error::{NotifierError, Result};
use crate::webhook::verify::KickVerifier;

pub const KICK_AUTH_BASE: &str = "https://id.kick.com/oauth";
pub const KICK_API_BASE: &str = "https://api.kick.com/public/v1";
pub const KICK_PUBLIC_CHANNEL_BASE: &str = "https://kick.com/api/v2/channels";

/// Webhook event fired when a channel starts or stops streaming
pub const LIVESTREAM_STATUS_UPDATED: &str = "livestream.status.updated";

/// Scopes requested for the user token
pub const KICK_USER_SCOPES: &str = "user:read channel:read events:subscribe";

/// Base URLs the client talks to
#[derive(Debug, Clone)]
pub struct KickEndpoints {
    pub auth_base: String,
    pub api_base: String,
    pub public_channel_base: String,
}

impl Default for KickEndpoints {
    fn default() -> Self {
        Self {
            auth_base: KICK_AUTH_BASE.to_string(),
            api_base: KICK_API_BASE.to_string(),
            public_channel_base: KICK_PUBLIC_CHANNEL_BASE.to_string(),
        }
    }
}

/// A Kick account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickUser {
    pub user_id: String,
    pub name: String,
    pub profile_picture: Option<String>,
}

impl KickUser {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            user_id: first_id(value, &["user_id", "id", "broadcaster_user_id"])?,
            name: first_str(value, &["name", "username", "user.username", "slug"])?,
            profile_picture: first_str(
                value,
                &["profile_picture", "profile_pic", "user.profile_pic", "user.profile_picture"],
            ),
        })
    }
}

/// Channel state normalized across the public API and the site API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickChannel {
    pub broadcaster_user_id: String,
    pub slug: String,
    pub is_live: bool,
    pub stream_title: String,
    pub category: String,
    pub thumbnail: Option<String>,
    pub username: Option<String>,
    pub profile_picture: Option<String>,
}

impl KickChannel {
    fn from_value(value: &Value) -> Option<Self> {
        let broadcaster_user_id = first_id(value, &["broadcaster_user_id", "user_id", "user.id"])?;
        let slug = first_str(value, &["slug", "channel_slug", "user.username"])?;

        let livestream = value.get("livestream").filter(|v| !v.is_null());
        let is_live = first_bool(value, &["stream.is_live", "livestream.is_live", "is_live"])
            .unwrap_or(livestream.is_some());

        Some(Self {
            broadcaster_user_id,
            slug,
            is_live,
            stream_title: first_str(
                value,
                &["stream_title", "stream.title", "livestream.session_title", "session_title"],
            )
            .unwrap_or_default(),
            category: first_str(
                value,
                &[
                    "category.name",
                    "livestream.categories.0.name",
                    "categories.0.name",
                    "recent_categories.0.name",
                ],
            )
            .unwrap_or_default(),
            thumbnail: first_str(
                value,
                &["stream.thumbnail", "livestream.thumbnail.url", "livestream.thumbnail", "thumbnail.url"],
            ),
            username: first_str(value, &["user.username", "username"]),
            profile_picture: first_str(value, &["user.profile_pic", "user.profile_picture", "profile_picture"]),
        })
    }
}

/// An event subscription owned by this application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickSubscription {
    pub id: String,
    pub broadcaster_user_id: String,
    pub event: String,
    pub version: i64,
}

impl KickSubscription {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: first_id(value, &["id", "subscription_id"])?,
            broadcaster_user_id: first_id(value, &["broadcaster_user_id"]).unwrap_or_default(),
            event: first_str(value, &["event", "name", "type"])?,
            version: lookup(value, "version").and_then(Value::as_i64).unwrap_or(1),
        })
    }
}

/// Client for the Kick API, owning the app and (optional) user token and the
/// webhook public key
pub struct KickClient {
    tokens: TokenManager,
    http_client: Arc<dyn HttpClient>,
    endpoints: KickEndpoints,
    verifier: OnceLock<KickVerifier>,
    /// Known broadcaster id to channel slug, used for the public fallback
    slugs: DashMap<String, String>,
}

impl KickClient {
    /// Create a new client against the production endpoints
    pub fn new(
        credentials: &PlatformCredentials,
        token_dir: Option<&Path>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self::with_endpoints(credentials, token_dir, http_client, KickEndpoints::default())
    }

    /// Create a new client with custom base URLs
    pub fn with_endpoints(
        credentials: &PlatformCredentials,
        token_dir: Option<&Path>,
        http_client: Arc<dyn HttpClient>,
        endpoints: KickEndpoints,
    ) -> Self {
        let oauth = OAuthClient::new(
            "kick",
            format!("{}/token", endpoints.auth_base),
            format!("{}/revoke", endpoints.auth_base),
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            http_client.clone(),
        );
        let store = token_dir.map(|dir| TokenFileStore::new(dir, "kick"));

        Self {
            tokens: TokenManager::new("kick", oauth, store, RefreshFailurePolicy::ClearStored),
            http_client,
            endpoints,
            verifier: OnceLock::new(),
            slugs: DashMap::new(),
        }
    }

    /// Load or fetch the app token, pick up a persisted user token and fetch
    /// the webhook public key.
    ///
    /// A public key failure is logged and leaves Kick signature checks
    /// failing; it does not fail initialization.
    pub async fn initialize(&self) -> Result<()> {
        self.tokens.initialize_app().await?;
        self.tokens.load_user().await;

        match self.fetch_public_key().await {
            Ok(pem) => match KickVerifier::from_pem(&pem) {
                Ok(verifier) => {
                    if self.set_verifier(verifier) {
                        info!(platform = "kick", "Loaded webhook public key");
                    }
                }
                Err(e) => error!(platform = "kick", error = %e, "Kick public key could not be parsed"),
            },
            Err(e) => error!(platform = "kick", error = %e, "Failed to fetch Kick public key"),
        }

        info!(platform = "kick", "Kick client initialized");
        Ok(())
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Signature verifier, absent if the public key could not be loaded
    pub fn verifier(&self) -> Option<&KickVerifier> {
        self.verifier.get()
    }

    /// Install a verifier. Only the first key is kept; returns whether this
    /// one was installed.
    pub fn set_verifier(&self, verifier: KickVerifier) -> bool {
        let installed = self.verifier.set(verifier).is_ok();
        if !installed {
            debug!(platform = "kick", "Webhook public key already loaded, keeping the first one");
        }
        installed
    }

    /// Record the channel slug for a broadcaster id
    pub fn remember_slug(&self, broadcaster_user_id: &str, slug: &str) {
        if !slug.is_empty() {
            self.slugs
                .insert(broadcaster_user_id.to_string(), slug.to_lowercase());
        }
    }

    /// Token used for read endpoints
    async fn read_token_kind(&self) -> TokenKind {
        if self.tokens.has_token(TokenKind::User).await {
            TokenKind::User
        } else {
            TokenKind::App
        }
    }

    /// URL of Kick's authorize endpoint for a PKCE flow
    pub fn authorize_url(&self, redirect_uri: &str, state: &str, code_challenge: &str) -> Result<String> {
        let mut url = url::Url::parse(&format!("{}/authorize", self.endpoints.auth_base))
            .map_err(|e| NotifierError::config_with_source("Invalid Kick authorize URL", e))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.tokens.oauth().client_id())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", KICK_USER_SCOPES)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Make an authenticated API request.
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
        self.request_with_token(endpoint, method, body, &access_token)
            .await
    }

    async fn request_with_token(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<Option<Value>> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", access_token));
        headers.insert("Accept".to_string(), "application/json".to_string());
        if body.is_some() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        let url = format!("{}{}", self.endpoints.api_base, endpoint);
        let response = self
            .http_client
            .send(method, &url, headers, body.map(Value::to_string))
            .await?;

        if !response.is_success() {
            warn!(
                platform = "kick",
                status = response.status(),
                endpoint,
                "Kick API request failed"
            );
            return Err(NotifierError::api_with_status(
                format!("Kick {} {} failed", method, endpoint),
                response.status(),
                response.text(),
            ));
        }

        if response.status() == 204 || response.body().trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(response.json()?))
    }

    /// Look up users by id, with the user token when one is held
    pub async fn get_users(&self, ids: &[String]) -> Result<Vec<KickUser>> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(ids.iter().map(|id| ("id", id.as_str())))
            .finish();
        let kind = self.read_token_kind().await;
        let value = self
            .request(&format!("/users?{}", query), HttpMethod::GET, None, kind)
            .await?;
        Ok(data_items(value.as_ref())
            .iter()
            .filter_map(KickUser::from_value)
            .collect())
    }

    /// The account a user access token belongs to
    pub async fn get_token_owner(&self, access_token: &str) -> Result<KickUser> {
        let value = self
            .request_with_token("/users", HttpMethod::GET, None, access_token)
            .await?;
        data_items(value.as_ref())
            .first()
            .and_then(KickUser::from_value)
            .ok_or_else(|| NotifierError::api("Kick /users returned no user for the token"))
    }

    /// Look up a channel by broadcaster id, falling back to the public site
    /// API when the slug is known
    pub async fn get_channel_by_id(&self, broadcaster_user_id: &str) -> Result<KickChannel> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("broadcaster_user_id", broadcaster_user_id)
            .finish();
        let primary = self.channel_lookup(&format!("/channels?{}", query)).await;

        match primary {
            Ok(channel) => {
                self.remember_slug(&channel.broadcaster_user_id, &channel.slug);
                Ok(channel)
            }
            Err(e) => {
                let slug = self.slugs.get(broadcaster_user_id).map(|s| s.value().clone());
                match slug {
                    Some(slug) => {
                        warn!(platform = "kick", broadcaster_user_id, error = %e, "Channel lookup failed, trying public endpoint");
                        self.get_public_channel(&slug).await
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Look up a channel by slug, falling back to the public site API
    pub async fn get_channel_by_slug(&self, slug: &str) -> Result<KickChannel> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("slug", slug)
            .finish();

        let channel = match self.channel_lookup(&format!("/channels?{}", query)).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(platform = "kick", slug, error = %e, "Channel lookup failed, trying public endpoint");
                self.get_public_channel(slug).await?
            }
        };
        self.remember_slug(&channel.broadcaster_user_id, &channel.slug);
        Ok(channel)
    }

    async fn channel_lookup(&self, endpoint: &str) -> Result<KickChannel> {
        let kind = self.read_token_kind().await;
        let value = self.request(endpoint, HttpMethod::GET, None, kind).await?;
        data_items(value.as_ref())
            .first()
            .and_then(KickChannel::from_value)
            .ok_or_else(|| NotifierError::api(format!("Kick {} returned no channel", endpoint)))
    }

    /// Unauthenticated channel lookup on the public site API
    pub async fn get_public_channel(&self, slug: &str) -> Result<KickChannel> {
        let url = format!("{}/{}", self.endpoints.public_channel_base, slug);
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        let response = self.http_client.get(&url, headers).await?;
        if !response.is_success() {
            return Err(NotifierError::api_with_status(
                format!("Kick public channel lookup for {} failed", slug),
                response.status(),
                response.text(),
            ));
        }

        let value: Value = response.json()?;
        KickChannel::from_value(&value)
            .ok_or_else(|| NotifierError::api(format!("Kick public channel {} not understood", slug)))
    }

    /// Event subscriptions owned by this application
    pub async fn list_subscriptions(&self) -> Result<Vec<KickSubscription>> {
        let value = self
            .request("/events/subscriptions", HttpMethod::GET, None, TokenKind::App)
            .await?;
        let subscriptions: Vec<KickSubscription> = data_items(value.as_ref())
            .iter()
            .filter_map(KickSubscription::from_value)
            .collect();
        debug!(platform = "kick", count = subscriptions.len(), "Listed subscriptions");
        Ok(subscriptions)
    }

    /// Subscribe to `livestream.status.updated` for a broadcaster.
    ///
    /// Returns the new subscription id.
    pub async fn create_livestream_subscription(&self, broadcaster_user_id: &str) -> Result<String> {
        // Kick expects a numeric id
        let broadcaster = broadcaster_user_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(broadcaster_user_id));
        let body = json!({
            "broadcaster_user_id": broadcaster,
            "events": [{ "name": LIVESTREAM_STATUS_UPDATED, "version": 1 }],
            "method": "webhook",
        });

        let value = self
            .request("/events/subscriptions", HttpMethod::POST, Some(&body), TokenKind::App)
            .await?;
        let items = data_items(value.as_ref());
        let Some(result) = items.first() else {
            return Err(NotifierError::api("Kick subscription create returned no data"));
        };

        if let Some(err) = first_str(result, &["error"]) {
            return Err(NotifierError::api(format!(
                "Kick rejected subscription for {}: {}",
                broadcaster_user_id, err
            )));
        }
        let id = first_id(result, &["subscription_id", "id"])
            .ok_or_else(|| NotifierError::api("Kick subscription create returned no id"))?;

        info!(
            platform = "kick",
            broadcaster_user_id,
            subscription_id = %id,
            "Created livestream.status.updated subscription"
        );
        Ok(id)
    }

    /// Delete an event subscription
    pub async fn delete_subscription(&self, id: &str) -> Result<()> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id", id)
            .finish();
        self.request(
            &format!("/events/subscriptions?{}", query),
            HttpMethod::DELETE,
            None,
            TokenKind::App,
        )
        .await?;
        info!(platform = "kick", subscription_id = id, "Deleted subscription");
        Ok(())
    }

    /// Fetch the PEM public key Kick signs webhooks with
    pub async fn fetch_public_key(&self) -> Result<String> {
        let url = format!("{}/public-key", self.endpoints.api_base);
        let response = self.http_client.get(&url, HashMap::new()).await?;
        if !response.is_success() {
            return Err(NotifierError::api_with_status(
                "Kick public key fetch failed",
                response.status(),
                response.text(),
            ));
        }
        let value: Value = response.json()?;
        first_str(&value, &["data.public_key", "public_key"])
            .ok_or_else(|| NotifierError::api("Kick public key response has no key"))
    }
}

#[async_trait]
impl StreamSource for KickClient {
    fn platform(&self) -> Platform {
        Platform::Kick
    }

    async fn fetch_stream_data(&self, broadcaster_id: &str) -> Result<Option<NormalizedStreamData>> {
        let channel = self.get_channel_by_id(broadcaster_id).await?;
        if !channel.is_live {
            debug!(platform = "kick", broadcaster_id, "Channel not reported live yet");
            return Ok(None);
        }

        let (username, profile_picture) = match (&channel.username, &channel.profile_picture) {
            (Some(name), Some(picture)) => (name.clone(), Some(picture.clone())),
            _ => match self.get_users(&[broadcaster_id.to_string()]).await {
                Ok(users) => match users.into_iter().next() {
                    Some(user) => (user.name, user.profile_picture),
                    None => (channel.username.clone().unwrap_or_else(|| channel.slug.clone()), None),
                },
                Err(e) => {
                    warn!(platform = "kick", broadcaster_id, error = %e, "User lookup failed, using channel slug");
                    (channel.username.clone().unwrap_or_else(|| channel.slug.clone()), None)
                }
            },
        };

        Ok(Some(NormalizedStreamData {
            stream_title: channel.stream_title,
            stream_category: channel.category,
            username,
            stream_url: format!("https://kick.com/{}", channel.slug),
            stream_thumbnail: channel.thumbnail,
            user_thumbnail: profile_picture,
        }))
    }
}

/// Items of a `{"data": [...]}` (or `{"data": {...}}`) envelope
fn data_items(value: Option<&Value>) -> Vec<Value> {
    match value.and_then(|v| v.get("data")) {
        Some(Value::Array(items)) => items.clone(),
        Some(item @ Value::Object(_)) => vec![item.clone()],
        _ => Vec::new(),
    }
}
