//! OAuth2 token endpoint client.
//!
//! Twitch and Kick both speak plain form-encoded OAuth2 on their identity
//! hosts, so one client covers client-credentials, refresh-token and
//! authorization-code grants for either platform.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::http_client::HttpClient;
use crate::auth::token::{Token, TokenResponse};
use crate::error::{NotifierError, Result};

/// Credentials and endpoints for one OAuth provider
#[derive(Clone)]
pub struct OAuthClient {
    provider: &'static str,
    token_url: String,
    revoke_url: String,
    client_id: String,
    client_secret: String,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthClient {
    pub fn new(
        provider: &'static str,
        token_url: impl Into<String>,
        revoke_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            provider,
            token_url: token_url.into(),
            revoke_url: revoke_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http_client,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Obtain an app token with the client-credentials grant
    pub async fn client_credentials(&self) -> Result<Token> {
        debug!(platform = self.provider, "Requesting app token");
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .await
    }

    /// Exchange a refresh token for a new user token.
    ///
    /// Providers that do not rotate refresh tokens omit it from the response;
    /// the old one is carried over in that case.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        debug!(platform = self.provider, "Refreshing user token");
        let mut token = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    /// Exchange an authorization code (PKCE) for a user token
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token> {
        debug!(platform = self.provider, "Exchanging authorization code");
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Revoke an access token at the provider
    pub async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http_client
            .post_form(
                &self.revoke_url,
                HashMap::new(),
                &[
                    ("client_id", self.client_id.as_str()),
                    ("token", access_token),
                    ("token_hint_type", "access_token"),
                ],
            )
            .await?;

        if !response.is_success() {
            warn!(
                platform = self.provider,
                status = response.status(),
                "Token revocation rejected"
            );
            return Err(NotifierError::api_with_status(
                format!("{} token revocation failed", self.provider),
                response.status(),
                response.text(),
            ));
        }
        Ok(())
    }

    async fn token_request(&self, fields: &[(&str, &str)]) -> Result<Token> {
        let response = self
            .http_client
            .post_form(&self.token_url, HashMap::new(), fields)
            .await
            .map_err(|e| {
                NotifierError::auth_with_source(
                    format!("{} token endpoint unreachable", self.provider),
                    e,
                )
            })?;

        if !response.is_success() {
            return Err(NotifierError::auth(format!(
                "{} token endpoint returned {}: {}",
                self.provider,
                response.status(),
                response.body()
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(response.body()).map_err(|e| {
            NotifierError::auth_with_source(
                format!("{} token response was not understood", self.provider),
                e,
            )
        })?;

        Ok(parsed.into_token())
    }
}
