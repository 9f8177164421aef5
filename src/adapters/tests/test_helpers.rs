//! Shared test utilities for adapter tests

use serde_json::json;
use std::sync::Arc;

use crate::adapters::http_client::mock::MockHttpClient;
use crate::adapters::http_client::HttpMethod;
use crate::adapters::kick::KickEndpoints;
use crate::adapters::twitch::TwitchEndpoints;
use crate::adapters::{KickClient, TwitchClient};
use crate::config::PlatformCredentials;

pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const HELIX: &str = "https://api.twitch.tv/helix";
pub const KICK_TOKEN_URL: &str = "https://id.kick.com/oauth/token";
pub const KICK_API: &str = "https://api.kick.com/public/v1";
pub const KICK_PUBLIC: &str = "https://kick.com/api/v2/channels";

pub fn test_credentials() -> PlatformCredentials {
    PlatformCredentials {
        client_id: "test_client_id".to_string(),
        client_secret: "test_client_secret".to_string(),
    }
}

/// Queue a client-credentials response on a token endpoint
pub fn mock_app_token(mock: &MockHttpClient, token_url: &str, access_token: &str) {
    mock.mock_json(
        HttpMethod::POST,
        token_url,
        200,
        &json!({"access_token": access_token, "expires_in": 5000000, "token_type": "bearer"}),
    );
}

/// Twitch client with an app token already fetched
pub async fn twitch_client(mock: &MockHttpClient) -> TwitchClient {
    mock_app_token(mock, TWITCH_TOKEN_URL, "app-token");
    let client = TwitchClient::with_endpoints(
        &test_credentials(),
        None,
        Arc::new(mock.clone()),
        TwitchEndpoints::default(),
    );
    client.initialize().await.unwrap();
    client
}

/// Kick client with an app token fetched and no public key
pub async fn kick_client(mock: &MockHttpClient) -> KickClient {
    mock_app_token(mock, KICK_TOKEN_URL, "kick-app-token");
    mock.mock_response(HttpMethod::GET, format!("{}/public-key", KICK_API), 503, "");
    let client = KickClient::with_endpoints(
        &test_credentials(),
        None,
        Arc::new(mock.clone()),
        KickEndpoints::default(),
    );
    client.initialize().await.unwrap();
    client
}
