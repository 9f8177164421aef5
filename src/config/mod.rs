use rand::distributions::{Alphanumeric, DistString};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::adapters::Platform;
use crate::error::{NotifierError, Result};

// Default configuration values
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CHANNELS_DIR: &str = "./channels";
const DEFAULT_DISCORD_USERNAME: &str = "streamcall";
const GENERATED_SECRET_LEN: usize = 32;

/// OAuth application credentials for one platform
#[derive(Clone)]
pub struct PlatformCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Where and how live notifications are posted
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Twitch credentials; Twitch is disabled when absent
    pub twitch: Option<PlatformCredentials>,
    /// Kick credentials; Kick is disabled when absent
    pub kick: Option<PlatformCredentials>,
    pub discord: DiscordConfig,
    /// Directory holding `twitch.txt` and `kick.txt`
    pub channels_dir: PathBuf,
    /// Externally reachable host name used in callback URLs
    pub public_host: String,
    pub port: u16,
    /// Secret shared with Twitch for EventSub signatures
    pub webhook_secret: String,
    /// Token persistence directory; tokens stay in memory when unset
    pub token_dir: Option<PathBuf>,
    /// Gate for the dashboard and Kick OAuth routes
    pub dashboard_secret: Option<String>,
    /// Kick user ids allowed to authorize the user token
    pub kick_authorized_users: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a key/value map
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                NotifierError::config(format!("{} environment variable is not set", key))
            })
        };

        let twitch = credentials(&get, "TWITCH_CLIENT_ID", "TWITCH_CLIENT_SECRET")?;
        let kick = credentials(&get, "KICK_CLIENT_ID", "KICK_CLIENT_SECRET")?;
        if twitch.is_none() && kick.is_none() {
            return Err(NotifierError::config(
                "No platform configured, set TWITCH_CLIENT_ID/TWITCH_CLIENT_SECRET or KICK_CLIENT_ID/KICK_CLIENT_SECRET",
            ));
        }

        let discord = DiscordConfig {
            webhook_url: require("DISCORD_WEBHOOK_URL")?,
            username: get("DISCORD_USERNAME").unwrap_or_else(|| DEFAULT_DISCORD_USERNAME.to_string()),
            avatar_url: get("DISCORD_AVATAR_URL"),
        };
        url::Url::parse(&discord.webhook_url).map_err(|e| {
            NotifierError::config_with_source("DISCORD_WEBHOOK_URL is not a valid URL", e)
        })?;

        let public_host = normalize_host(&require("PUBLIC_HOST")?);

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                NotifierError::config_with_source(format!("PORT '{}' is not a valid port", raw), e)
            })?,
            None => DEFAULT_PORT,
        };

        let webhook_secret = match get("WEBHOOK_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("WEBHOOK_SECRET not set, generated a random secret for this process");
                generate_secret()
            }
        };

        let kick_authorized_users = get("KICK_AUTHORIZED_USERS")
            .map(|raw| {
                raw.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            twitch,
            kick,
            discord,
            channels_dir: get("CHANNELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_DIR)),
            public_host,
            port,
            webhook_secret,
            token_dir: get("TOKEN_DIR").map(PathBuf::from),
            dashboard_secret: get("DASHBOARD_SECRET"),
            kick_authorized_users,
        };

        info!(
            twitch = config.twitch.is_some(),
            kick = config.kick.is_some(),
            port = config.port,
            persist_tokens = config.token_dir.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Platforms with credentials configured
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.twitch.is_some() {
            platforms.push(Platform::Twitch);
        }
        if self.kick.is_some() {
            platforms.push(Platform::Kick);
        }
        platforms
    }

    /// Public URL the platform posts webhook events to
    pub fn event_callback_url(&self, platform: Platform) -> String {
        format!("https://{}/events/{}", self.public_host, platform.as_str())
    }

    /// Redirect URI registered for the Kick authorization-code flow
    pub fn kick_redirect_uri(&self) -> String {
        format!("https://{}/callback/kick", self.public_host)
    }

    /// Whether a Kick user id may authorize the user token
    pub fn is_kick_user_authorized(&self, user_id: &str) -> bool {
        self.kick_authorized_users.iter().any(|id| id == user_id)
    }
}

fn credentials<G>(get: &G, id_key: &str, secret_key: &str) -> Result<Option<PlatformCredentials>>
where
    G: Fn(&str) -> Option<String>,
{
    match (get(id_key), get(secret_key)) {
        (Some(client_id), Some(client_secret)) => Ok(Some(PlatformCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(NotifierError::config(format!(
            "{} is set but {} is missing",
            id_key, secret_key
        ))),
        (None, Some(_)) => Err(NotifierError::config(format!(
            "{} is set but {} is missing",
            secret_key, id_key
        ))),
    }
}

/// Accept `example.com`, `https://example.com/` and similar
fn normalize_host(raw: &str) -> String {
    let host = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    host.trim_end_matches('/').to_string()
}

/// Generate a random alphanumeric secret
pub fn generate_secret() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), GENERATED_SECRET_LEN)
}
