pub mod adapters;
pub mod api;
pub mod auth;
pub mod channels;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod notification;
pub mod service;
pub mod webhook;

// Re-export the pieces main and integration tests wire together
pub use crate::adapters::{NormalizedStreamData, Platform, StreamSource};
pub use crate::config::Config;
pub use crate::error::{NotifierError, Result};
pub use crate::service::NotifierService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
