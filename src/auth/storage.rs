use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::auth::token::{Token, TokenKind};
use crate::error::{NotifierError, Result};

/// File-backed storage for one platform's tokens.
///
/// Each token kind lives in its own JSON file so the app and user tokens can
/// be rewritten independently.
#[derive(Debug, Clone)]
pub struct TokenFileStore {
    data_dir: PathBuf,
    platform: &'static str,
}

impl TokenFileStore {
    /// Create a new store rooted at the given data directory
    pub fn new(data_dir: impl AsRef<Path>, platform: &'static str) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            platform,
        }
    }

    /// Get the path for a token file
    pub fn token_path(&self, kind: TokenKind) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}_token.json", self.platform, kind))
    }

    /// Persist a token, creating the data directory if needed
    pub async fn save(&self, kind: TokenKind, token: &Token) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            NotifierError::storage_with_source(
                format!("Failed to create token directory {}", self.data_dir.display()),
                e,
            )
        })?;

        let path = self.token_path(kind);
        let token_json = serde_json::to_string_pretty(token)
            .map_err(|e| NotifierError::storage_with_source("Failed to serialize token", e))?;

        fs::write(&path, token_json).await.map_err(|e| {
            NotifierError::storage_with_source(
                format!("Failed to write token file {}", path.display()),
                e,
            )
        })?;

        debug!(platform = self.platform, kind = %kind, "Token persisted");
        Ok(())
    }

    /// Load a token. A missing file is not an error.
    pub async fn load(&self, kind: TokenKind) -> Result<Option<Token>> {
        let path = self.token_path(kind);

        let token_json = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(platform = self.platform, kind = %kind, "No persisted token");
                return Ok(None);
            }
            Err(e) => {
                return Err(NotifierError::storage_with_source(
                    format!("Failed to read token file {}", path.display()),
                    e,
                ))
            }
        };

        let token: Token = serde_json::from_str(&token_json)
            .map_err(|e| NotifierError::storage_with_source("Failed to deserialize token", e))?;

        Ok(Some(token))
    }

    /// Remove a persisted token, if present
    pub async fn remove(&self, kind: TokenKind) -> Result<()> {
        let path = self.token_path(kind);

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(platform = self.platform, kind = %kind, "Persisted token removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NotifierError::storage_with_source(
                format!("Failed to remove token file {}", path.display()),
                e,
            )),
        }
    }
}
