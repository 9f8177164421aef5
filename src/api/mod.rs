mod oauth;
mod server;

pub use server::{router, serve, AppState};
