//! Error types shared by the token store, platform clients, webhook
//! receiver and notification pipeline.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the notifier
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<BoxError>,
    },

    /// Token fetch or refresh failure
    #[error("Authentication error: {message}")]
    Auth {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<BoxError>,
    },

    /// Non-2xx response from a platform REST API
    #[error("API error: {message}")]
    Api {
        /// Error message
        message: String,
        /// Status code if available
        status: Option<u16>,
        /// Raw response body if available
        body: Option<String>,
        /// Optional context
        #[source]
        source: Option<BoxError>,
    },

    /// Transport level failure talking to a remote service
    #[error("Connection error: {message}")]
    Connection {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<BoxError>,
    },

    /// Inbound webhook could not be authenticated
    #[error("Verification error: {message}")]
    Verification {
        /// Error message
        message: String,
    },

    /// Token file persistence failure
    #[error("Storage error: {message}")]
    Storage {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<BoxError>,
    },
}

impl NotifierError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source
    pub fn config_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap another error as an authentication failure, keeping it as the source
    pub fn auth_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Auth {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new API error
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status: None,
            body: None,
            source: None,
        }
    }

    /// Create a new API error carrying the response status and body
    pub fn api_with_status(message: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status: Some(status),
            body: Some(body.into()),
            source: None,
        }
    }

    /// Create a new API error with source
    pub fn api_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Api {
            message: message.into(),
            status: None,
            body: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new connection error with source
    pub fn connection_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new verification error
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Create a new storage error with source
    pub fn storage_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this is an authentication error
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Check if this is an API error
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this is a verification error
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification { .. })
    }
}

impl From<reqwest::Error> for NotifierError {
    fn from(err: reqwest::Error) -> Self {
        Self::connection_with_source("HTTP request failed", err)
    }
}

impl From<serde_json::Error> for NotifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::api_with_source("Failed to parse JSON", err)
    }
}

impl From<std::io::Error> for NotifierError {
    fn from(err: std::io::Error) -> Self {
        Self::storage_with_source("I/O failure", err)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, NotifierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_status_and_body() {
        let err = NotifierError::api_with_status("Helix request failed", 404, "not found");
        assert!(err.is_api());
        assert_eq!(err.status(), Some(404));
        match err {
            NotifierError::Api { body, .. } => assert_eq!(body.as_deref(), Some("not found")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_display_includes_category() {
        let err = NotifierError::auth("no refresh token stored");
        assert_eq!(err.to_string(), "Authentication error: no refresh token stored");
        assert!(err.is_auth());
        assert!(!err.is_config());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NotifierError = io.into();
        assert!(matches!(err, NotifierError::Storage { .. }));
    }
}
