//! Integration test harness for streamcall

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tower::ServiceExt;

use streamcall::adapters::kick::KickEndpoints;
use streamcall::adapters::twitch::TwitchEndpoints;
use streamcall::common::RetryPolicy;
use streamcall::{Config, NotifierService};

pub const WEBHOOK_SECRET: &str = "integration-secret-0123456789";
pub const PUBLIC_HOST: &str = "notify.example.com";

/// Environment for a Twitch-only deployment pointed at `server_url`
pub fn twitch_env(server_url: &str, channels_dir: &std::path::Path) -> HashMap<String, String> {
    HashMap::from([
        ("TWITCH_CLIENT_ID".to_string(), "it_client_id".to_string()),
        ("TWITCH_CLIENT_SECRET".to_string(), "it_client_secret".to_string()),
        ("DISCORD_WEBHOOK_URL".to_string(), format!("{}/discord/webhook", server_url)),
        ("PUBLIC_HOST".to_string(), format!("https://{}/", PUBLIC_HOST)),
        ("WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string()),
        ("CHANNELS_DIR".to_string(), channels_dir.display().to_string()),
    ])
}

/// Service whose Twitch client talks to the mock server
pub fn service(server_url: &str, vars: &HashMap<String, String>) -> NotifierService {
    let config = Config::from_map(vars).expect("valid test config");
    NotifierService::new(config)
        .with_endpoints(
            TwitchEndpoints {
                auth_base: format!("{}/oauth2", server_url),
                helix_base: format!("{}/helix", server_url),
            },
            KickEndpoints::default(),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(20),
        })
}

/// Send one request through the router
pub async fn call(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.expect("router is infallible")
}

/// Read a whole response body as text
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Poll until `check` passes or the deadline expires
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
