use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::oauth::OAuthClient;
use crate::auth::storage::TokenFileStore;
use crate::auth::token::{Token, TokenKind};
use crate::error::{NotifierError, Result};

/// What to do with a stored user token when refreshing it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailurePolicy {
    /// Keep the stored token and surface the error
    Propagate,
    /// Drop the stored token (memory and disk) so the user has to authorize again
    ClearStored,
}

/// One token value plus the lock that serializes its refresh
#[derive(Default)]
struct TokenSlot {
    token: RwLock<Option<Token>>,
    refresh_lock: Mutex<()>,
}

/// Token Manager for one platform's app and user tokens
pub struct TokenManager {
    platform: &'static str,
    oauth: OAuthClient,
    store: Option<TokenFileStore>,
    app: TokenSlot,
    user: TokenSlot,
    user_refresh_failure: RefreshFailurePolicy,
}

impl TokenManager {
    /// Create a new token manager. Without a store tokens only live in memory.
    pub fn new(
        platform: &'static str,
        oauth: OAuthClient,
        store: Option<TokenFileStore>,
        user_refresh_failure: RefreshFailurePolicy,
    ) -> Self {
        Self {
            platform,
            oauth,
            store,
            app: TokenSlot::default(),
            user: TokenSlot::default(),
            user_refresh_failure,
        }
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// The OAuth client backing this manager
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    fn slot(&self, kind: TokenKind) -> &TokenSlot {
        match kind {
            TokenKind::App => &self.app,
            TokenKind::User => &self.user,
        }
    }

    /// Load the persisted app token, fetching a new one if none is stored
    pub async fn initialize_app(&self) -> Result<()> {
        if let Some(token) = self.load_persisted(TokenKind::App).await {
            info!(platform = self.platform, "Loaded persisted app token");
            *self.app.token.write().await = Some(token);
            return Ok(());
        }

        let token = self.oauth.client_credentials().await?;
        self.persist(TokenKind::App, &token).await;
        *self.app.token.write().await = Some(token);
        info!(platform = self.platform, "Obtained app token");
        Ok(())
    }

    /// Load the persisted user token if there is one.
    ///
    /// Returns `false` when no user token is available; user-scoped calls are
    /// then unavailable until an authorization flow stores one.
    pub async fn load_user(&self) -> bool {
        match self.load_persisted(TokenKind::User).await {
            Some(token) => {
                info!(platform = self.platform, "Loaded persisted user token");
                *self.user.token.write().await = Some(token);
                true
            }
            None => {
                warn!(
                    platform = self.platform,
                    "No user token available, user-scoped calls disabled"
                );
                false
            }
        }
    }

    async fn load_persisted(&self, kind: TokenKind) -> Option<Token> {
        let store = self.store.as_ref()?;
        match store.load(kind).await {
            Ok(token) => token,
            Err(e) => {
                warn!(platform = self.platform, kind = %kind, error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    async fn persist(&self, kind: TokenKind, token: &Token) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(kind, token).await {
                warn!(platform = self.platform, kind = %kind, error = %e, "Failed to persist token");
            }
        }
    }

    /// Whether a token of this kind is currently held (expired or not)
    pub async fn has_token(&self, kind: TokenKind) -> bool {
        self.slot(kind).token.read().await.is_some()
    }

    /// Snapshot of the current token of this kind
    pub async fn current(&self, kind: TokenKind) -> Option<Token> {
        self.slot(kind).token.read().await.clone()
    }

    /// Store a freshly obtained token, replacing whatever was held
    pub async fn set_token(&self, kind: TokenKind, token: Token) {
        self.persist(kind, &token).await;
        *self.slot(kind).token.write().await = Some(token);
        info!(platform = self.platform, kind = %kind, "Token stored");
    }

    /// Drop a token from memory and disk
    pub async fn clear(&self, kind: TokenKind) {
        *self.slot(kind).token.write().await = None;
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(kind).await {
                warn!(platform = self.platform, kind = %kind, error = %e, "Failed to remove token file");
            }
        }
    }

    /// Revoke a token at the provider, then forget it locally.
    ///
    /// Local state is cleared even if the provider rejects the revocation.
    pub async fn revoke(&self, kind: TokenKind) -> Result<()> {
        let token = self.current(kind).await;
        let result = match &token {
            Some(token) => self.oauth.revoke(&token.access_token).await,
            None => Ok(()),
        };
        self.clear(kind).await;
        info!(platform = self.platform, kind = %kind, "Token revoked");
        result
    }

    /// Return a non-expired access token, refreshing first if needed.
    ///
    /// Refresh failures are returned to the caller; there is no retry here.
    pub async fn valid_access_token(&self, kind: TokenKind) -> Result<String> {
        let slot = self.slot(kind);

        if let Some(token) = slot.token.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let _guard = slot.refresh_lock.lock().await;

        // Another task may have refreshed while we waited for the lock
        let current = slot.token.read().await.clone();
        if let Some(token) = &current {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = match kind {
            TokenKind::App => {
                debug!(platform = self.platform, "App token missing or expired");
                self.oauth.client_credentials().await?
            }
            TokenKind::User => self.refresh_user(current).await?,
        };

        self.persist(kind, &fresh).await;
        let access_token = fresh.access_token.clone();
        *slot.token.write().await = Some(fresh);
        info!(platform = self.platform, kind = %kind, "Token refreshed");

        Ok(access_token)
    }

    async fn refresh_user(&self, current: Option<Token>) -> Result<Token> {
        let Some(token) = current else {
            return Err(NotifierError::auth(format!(
                "{} user token unavailable, authorization required",
                self.platform
            )));
        };
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(NotifierError::auth(format!(
                "{} user token expired and no refresh token is stored",
                self.platform
            )));
        };

        match self.oauth.refresh(refresh_token).await {
            Ok(token) => Ok(token),
            Err(e) => {
                error!(platform = self.platform, error = %e, "User token refresh failed");
                if self.user_refresh_failure == RefreshFailurePolicy::ClearStored {
                    self.clear(TokenKind::User).await;
                    warn!(platform = self.platform, "Stored user token cleared, re-authorization required");
                }
                Err(e)
            }
        }
    }
}
