use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds shaved off the advertised lifetime before a token counts as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Which credential a request should be made with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Client-credentials token representing the application itself
    App,
    /// Token obtained on behalf of an authorized account
    User,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::App => "app",
            TokenKind::User => "user",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer token as issued by a platform token endpoint.
///
/// Tokens are immutable once built; a refresh produces a new value that
/// replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The access token used for API requests
    pub access_token: String,
    /// Refresh token, present for user tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, as reported by the issuer
    pub expires_in: i64,
    /// When the token was obtained, milliseconds since the UNIX epoch
    pub obtained_at: i64,
}

impl Token {
    /// Build a token obtained right now
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self::obtained_at(access_token, refresh_token, expires_in, now_millis())
    }

    /// Build a token with an explicit acquisition time
    pub fn obtained_at(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        obtained_at: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            obtained_at,
        }
    }

    /// Epoch millisecond after which the token is considered expired
    pub fn expiry_threshold(&self) -> i64 {
        self.obtained_at + (self.expires_in - EXPIRY_MARGIN_SECS) * 1000
    }

    /// Expired strictly after the threshold; exactly at it the token is still usable
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expiry_threshold()
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

/// Raw token endpoint response shared by Twitch and Kick
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Turn the response into a token. Missing lifetimes fall back to one hour.
    pub fn into_token(self) -> Token {
        Token::new(
            self.access_token,
            self.refresh_token,
            self.expires_in.unwrap_or(3600),
        )
    }
}

/// Current wall clock in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
