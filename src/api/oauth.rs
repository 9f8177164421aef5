//! Dashboard and Kick authorization-code (PKCE) flow

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::auth::TokenKind;

use super::server::AppState;

const DASHBOARD_TEMPLATE: &str = include_str!("dashboard.html");

#[derive(Debug, Deserialize)]
pub(crate) struct SecretQuery {
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/login/kick", get(login_kick))
        .route("/callback/kick", get(callback_kick))
        .route("/logout/kick", get(logout_kick))
}

/// Digest comparison, timing does not depend on a shared prefix
fn secret_matches(state: &AppState, provided: Option<&str>) -> bool {
    match (state.config.dashboard_secret.as_deref(), provided) {
        (Some(expected), Some(provided)) => {
            Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
        }
        _ => false,
    }
}

async fn dashboard(State(state): State<AppState>, Query(query): Query<SecretQuery>) -> Response {
    if !secret_matches(&state, query.secret.as_deref()) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let twitch_status = match state.twitch.get() {
        None => "Not configured",
        Some(client) => {
            if client.tokens().has_token(TokenKind::User).await {
                "Connected (user token)"
            } else {
                "Connected (app token)"
            }
        }
    };
    let kick_status = match state.kick.get() {
        None => "Not configured",
        Some(client) => {
            if client.tokens().has_token(TokenKind::User).await {
                "Account authorized"
            } else {
                "No account authorized"
            }
        }
    };
    let secret: String =
        url::form_urlencoded::byte_serialize(query.secret.as_deref().unwrap_or("").as_bytes()).collect();

    Html(
        DASHBOARD_TEMPLATE
            .replace("{{TWITCH_STATUS}}", twitch_status)
            .replace("{{KICK_STATUS}}", kick_status)
            .replace("{{SECRET}}", &secret),
    )
    .into_response()
}

async fn login_kick(State(state): State<AppState>, Query(query): Query<SecretQuery>) -> Response {
    if !secret_matches(&state, query.secret.as_deref()) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let Some(kick) = state.kick.get() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let challenge = state.pkce.begin();
    match kick.authorize_url(
        &state.config.kick_redirect_uri(),
        &challenge.state,
        &challenge.code_challenge,
    ) {
        Ok(url) => {
            info!(platform = "kick", "Starting authorization flow");
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Err(e) => {
            error!(platform = "kick", error = %e, "Failed to build authorize URL");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn callback_kick(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    if let Some(err) = query.error {
        warn!(platform = "kick", error = %err, "Authorization denied");
        return (StatusCode::BAD_REQUEST, "Authorization was not granted").into_response();
    }
    let (Some(code), Some(pkce_state)) = (query.code, query.state) else {
        return (StatusCode::BAD_REQUEST, "Missing code or state").into_response();
    };
    let Some(code_verifier) = state.pkce.consume(&pkce_state) else {
        warn!(platform = "kick", "Unknown or expired authorization state");
        return (StatusCode::BAD_REQUEST, "Authorization expired, start again").into_response();
    };
    let Some(kick) = state.kick.get() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let token = match kick
        .tokens()
        .oauth()
        .exchange_code(&code, &code_verifier, &state.config.kick_redirect_uri())
        .await
    {
        Ok(token) => token,
        Err(e) => {
            error!(platform = "kick", error = %e, "Code exchange failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let owner = match kick.get_token_owner(&token.access_token).await {
        Ok(owner) => owner,
        Err(e) => {
            error!(platform = "kick", error = %e, "Could not resolve authorizing user");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    if !state.config.is_kick_user_authorized(&owner.user_id) {
        warn!(
            platform = "kick",
            user_id = %owner.user_id,
            username = %owner.name,
            "Authorization from user not on the allowlist"
        );
        if let Err(e) = kick.tokens().oauth().revoke(&token.access_token).await {
            warn!(platform = "kick", error = %e, "Failed to revoke rejected token");
        }
        return (StatusCode::FORBIDDEN, "This account is not allowed").into_response();
    }

    kick.tokens().set_token(TokenKind::User, token).await;
    info!(platform = "kick", username = %owner.name, user_id = %owner.user_id, "Kick account authorized");
    Html(format!("<p>Kick account <b>{}</b> authorized.</p>", html_escape(&owner.name))).into_response()
}

async fn logout_kick(State(state): State<AppState>, Query(query): Query<SecretQuery>) -> Response {
    if !secret_matches(&state, query.secret.as_deref()) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let Some(kick) = state.kick.get() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Err(e) = kick.tokens().revoke(TokenKind::User).await {
        warn!(platform = "kick", error = %e, "Provider rejected revocation, local token cleared anyway");
    }
    (StatusCode::OK, "Kick account disconnected").into_response()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http_client::mock::MockHttpClient;
    use crate::adapters::http_client::HttpMethod;
    use crate::adapters::KickClient;
    use crate::api::router;
    use crate::auth::{PkceStateStore, Token};
    use crate::common::SharedClient;
    use crate::config::Config;
    use crate::events::live_event_channel;
    use crate::webhook::TwitchVerifier;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "dash-secret";
    const TOKEN_URL: &str = "https://id.kick.com/oauth/token";
    const REVOKE_URL: &str = "https://id.kick.com/oauth/revoke";
    const USERS_URL: &str = "https://api.kick.com/public/v1/users";

    async fn state(mock: &MockHttpClient) -> AppState {
        let vars: HashMap<String, String> = [
            ("KICK_CLIENT_ID", "kid"),
            ("KICK_CLIENT_SECRET", "ksecret"),
            ("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
            ("PUBLIC_HOST", "notify.example.com"),
            ("WEBHOOK_SECRET", "whsecret-whsecret"),
            ("DASHBOARD_SECRET", SECRET),
            ("KICK_AUTHORIZED_USERS", "123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = Config::from_map(&vars).unwrap();

        let kick = Arc::new(SharedClient::new("kick"));
        let credentials = config.kick.clone().unwrap();
        let http = Arc::new(mock.clone());
        kick.get_or_init(|| async move {
            let client = KickClient::new(&credentials, None, http);
            client
                .tokens()
                .set_token(TokenKind::App, Token::new("app".into(), None, 5_000_000))
                .await;
            Ok(client)
        })
        .await
        .unwrap();

        let (live_events, _rx) = live_event_channel();
        AppState {
            twitch_verifier: TwitchVerifier::new(config.webhook_secret.clone()),
            config: Arc::new(config),
            twitch: Arc::new(SharedClient::new("twitch")),
            kick,
            live_events,
            pkce: PkceStateStore::default(),
        }
    }

    async fn get(state: &AppState, uri: &str) -> Response {
        router(state.clone())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn user_token(state: &AppState) -> Option<Token> {
        state.kick.get().unwrap().tokens().current(TokenKind::User).await
    }

    fn mock_exchange(mock: &MockHttpClient, owner_id: u64, owner_name: &str) {
        mock.mock_json(
            HttpMethod::POST,
            TOKEN_URL,
            200,
            &json!({"access_token": "user-access", "refresh_token": "user-refresh", "expires_in": 7200}),
        );
        mock.mock_json(
            HttpMethod::GET,
            USERS_URL,
            200,
            &json!({"data": [{"user_id": owner_id, "name": owner_name, "email": "x@example.com"}]}),
        );
        mock.mock_response(HttpMethod::POST, REVOKE_URL, 200, "");
    }

    #[tokio::test]
    async fn test_dashboard_requires_secret() {
        let mock = MockHttpClient::new();
        let state = state(&mock).await;

        assert_eq!(get(&state, "/dashboard").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(get(&state, "/dashboard?secret=wrong").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(get(&state, "/login/kick").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(get(&state, "/logout/kick?secret=").await.status(), StatusCode::FORBIDDEN);

        let response = get(&state, &format!("/dashboard?secret={}", SECRET)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("No account authorized"));
        assert!(html.contains("Not configured"));
    }

    #[tokio::test]
    async fn test_login_redirects_with_pkce() {
        let mock = MockHttpClient::new();
        let state = state(&mock).await;

        let response = get(&state, &format!("/login/kick?secret={}", SECRET)).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        let url = url::Url::parse(location).unwrap();
        assert_eq!(url.host_str(), Some("id.kick.com"));
        assert_eq!(url.path(), "/oauth/authorize");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["redirect_uri"], "https://notify.example.com/callback/kick");
        assert!(!query["code_challenge"].is_empty());
        assert_eq!(state.pkce.len(), 1);
        assert!(state.pkce.consume(&query["state"]).is_some());
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let mock = MockHttpClient::new();
        let state = state(&mock).await;

        let response = get(&state, "/callback/kick?code=abc&state=never-issued").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(mock.get_requests().is_empty());
        assert!(user_token(&state).await.is_none());
    }

    #[tokio::test]
    async fn test_callback_rejects_expired_state() {
        let mock = MockHttpClient::new();
        let mut state = state(&mock).await;
        state.pkce = PkceStateStore::new(std::time::Duration::ZERO);
        let challenge = state.pkce.begin();

        let response = get(&state, &format!("/callback/kick?code=abc&state={}", challenge.state)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(user_token(&state).await.is_none());
    }

    #[tokio::test]
    async fn test_callback_stores_token_for_allowed_user_id() {
        let mock = MockHttpClient::new();
        mock_exchange(&mock, 123, "alice");
        let state = state(&mock).await;
        let challenge = state.pkce.begin();

        let response = get(&state, &format!("/callback/kick?code=abc&state={}", challenge.state)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(user_token(&state).await.unwrap().access_token, "user-access");
        assert_eq!(mock.count(HttpMethod::POST, REVOKE_URL), 0);

        let exchange = mock
            .get_requests()
            .into_iter()
            .find(|r| r.url == TOKEN_URL)
            .unwrap();
        let body = exchange.body.unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains(&format!("code_verifier={}", challenge.code_verifier)));

        // State is single use
        let replay = get(&state, &format!("/callback/kick?code=abc&state={}", challenge.state)).await;
        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_rejects_user_not_on_allowlist() {
        let mock = MockHttpClient::new();
        mock_exchange(&mock, 999, "mallory");
        let state = state(&mock).await;
        let challenge = state.pkce.begin();

        let response = get(&state, &format!("/callback/kick?code=abc&state={}", challenge.state)).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(user_token(&state).await.is_none());
        assert_eq!(mock.count(HttpMethod::POST, REVOKE_URL), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_user_token() {
        let mock = MockHttpClient::new();
        mock.mock_response(HttpMethod::POST, REVOKE_URL, 200, "");
        let state = state(&mock).await;
        state
            .kick
            .get()
            .unwrap()
            .tokens()
            .set_token(TokenKind::User, Token::new("user-access".into(), None, 7200))
            .await;

        let response = get(&state, &format!("/logout/kick?secret={}", SECRET)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(user_token(&state).await.is_none());
        let revoke = mock.get_requests().pop().unwrap();
        assert_eq!(revoke.url, REVOKE_URL);
        assert!(revoke.body.unwrap().contains("token=user-access"));
    }
}
