//! HTTP server: webhook receivers, health probes and (optionally) the
//! dashboard with the Kick OAuth flow

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::adapters::{KickClient, TwitchClient};
use crate::auth::PkceStateStore;
use crate::common::SharedClient;
use crate::config::Config;
use crate::error::{NotifierError, Result};
use crate::events::LiveEventSender;
use crate::webhook::{self, TwitchVerifier};

use super::oauth;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub twitch: Arc<SharedClient<TwitchClient>>,
    pub kick: Arc<SharedClient<KickClient>>,
    pub twitch_verifier: TwitchVerifier,
    pub live_events: LiveEventSender,
    pub pkce: PkceStateStore,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/events/twitch", get(twitch_probe).post(twitch_events))
        .route("/events/kick", get(kick_probe).post(kick_events));

    if state.config.dashboard_secret.is_some() {
        app = app.merge(oauth::routes());
    } else {
        info!("DASHBOARD_SECRET not set, dashboard and Kick OAuth routes disabled");
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| NotifierError::connection_with_source(format!("Failed to bind {}", addr), e))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| NotifierError::connection_with_source("HTTP server error", e))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn twitch_probe() -> &'static str {
    "Twitch EventSub endpoint"
}

async fn kick_probe() -> &'static str {
    "Kick webhook endpoint"
}

async fn twitch_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.twitch.is_initialized() {
        return StatusCode::NOT_FOUND.into_response();
    }
    webhook::twitch::handle_delivery(&state.twitch_verifier, &state.live_events, &headers, &body)
        .into_response()
}

async fn kick_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(kick) = state.kick.get() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    webhook::kick::handle_delivery(&kick, &state.live_events, &headers, &body).into_response()
}
