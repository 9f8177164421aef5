//! Platform API clients

pub mod base;
pub mod http_client;
pub mod kick;
pub mod twitch;

#[cfg(test)]
mod tests;

pub use base::{NormalizedStreamData, Platform, StreamSource};
pub use http_client::{HttpClient, HttpMethod, ReqwestHttpClient, SimpleHttpResponse};
pub use kick::KickClient;
pub use twitch::TwitchClient;
