//! stream.online delivery to Discord post, and subscription sync

use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use mockito::{Matcher, Server};
use serde_json::json;

use streamcall::api::router;
use streamcall::webhook::twitch::{
    MESSAGE_ID_HEADER, MESSAGE_SIGNATURE_HEADER, MESSAGE_TIMESTAMP_HEADER, MESSAGE_TYPE_HEADER,
};
use streamcall::webhook::TwitchVerifier;

use crate::harness::{call, service, twitch_env, wait_until, PUBLIC_HOST, WEBHOOK_SECRET};

const CALLBACK: &str = "https://notify.example.com/events/twitch";

async fn mock_token(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "it-app-token", "expires_in": 5011271, "token_type": "bearer"}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn test_stream_online_posts_to_discord() -> Result<()> {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let _stream = server
        .mock("GET", Matcher::Regex(r"^/helix/streams".to_string()))
        .match_query(Matcher::UrlEncoded("user_id".into(), "1337".into()))
        .match_header("authorization", "Bearer it-app-token")
        .match_header("client-id", "it_client_id")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": [{
                    "id": "1",
                    "user_id": "1337",
                    "user_login": "leet",
                    "user_name": "Leet",
                    "game_name": "Factorio",
                    "type": "live",
                    "title": "Megabase day 3",
                    "thumbnail_url": "https://cdn.example/live_leet-{width}x{height}.jpg",
                    "started_at": "2024-05-01T12:00:00Z"
                }],
                "pagination": {}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _user = server
        .mock("GET", Matcher::Regex(r"^/helix/users".to_string()))
        .match_query(Matcher::UrlEncoded("id".into(), "1337".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": [{"id": "1337", "login": "leet", "display_name": "Leet", "profile_image_url": "https://cdn.example/leet.png"}]})
                .to_string(),
        )
        .create_async()
        .await;
    let discord = server
        .mock("POST", "/discord/webhook")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Megabase day 3".to_string()),
            Matcher::Regex("Factorio".to_string()),
            Matcher::Regex("https://twitch.tv/leet".to_string()),
            Matcher::Regex("live_leet-1280x720.jpg".to_string()),
        ]))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let channels = tempfile::tempdir()?;
    let service = service(&server.url(), &twitch_env(&server.url(), channels.path()));
    let (state, worker) = service.start().await?;

    let body = json!({
        "subscription": {
            "id": "sub-1",
            "type": "stream.online",
            "version": "1",
            "status": "enabled",
            "condition": {"broadcaster_user_id": "1337"}
        },
        "event": {
            "id": "9001",
            "broadcaster_user_id": "1337",
            "broadcaster_user_login": "leet",
            "broadcaster_user_name": "Leet",
            "type": "live",
            "started_at": "2024-05-01T12:00:00Z"
        }
    })
    .to_string();
    let signature = TwitchVerifier::new(WEBHOOK_SECRET).sign("it-msg-2", "2024-05-01T12:00:00Z", body.as_bytes());
    let request = Request::post("/events/twitch")
        .header(MESSAGE_ID_HEADER, "it-msg-2")
        .header(MESSAGE_TIMESTAMP_HEADER, "2024-05-01T12:00:00Z")
        .header(MESSAGE_SIGNATURE_HEADER, signature)
        .header(MESSAGE_TYPE_HEADER, "notification")
        .body(Body::from(body))?;

    let response = call(router(state.clone()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(wait_until(Duration::from_secs(5), || discord.matched_async()).await);

    // Dropping every sender lets the worker finish
    drop(state);
    drop(service);
    tokio::time::timeout(Duration::from_secs(5), worker).await??;
    Ok(())
}

#[tokio::test]
async fn test_sync_creates_missing_and_removes_stale() -> Result<()> {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let _users = server
        .mock("GET", Matcher::Regex(r"^/helix/users".to_string()))
        .match_query(Matcher::UrlEncoded("login".into(), "leet".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": [{"id": "1337", "login": "leet", "display_name": "Leet", "profile_image_url": ""}]})
                .to_string(),
        )
        .create_async()
        .await;
    let _list = server
        .mock("GET", "/helix/eventsub/subscriptions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": [
                    {
                        "id": "stale-sub",
                        "status": "enabled",
                        "type": "stream.online",
                        "version": "1",
                        "condition": {"broadcaster_user_id": "42"},
                        "transport": {"method": "webhook", "callback": CALLBACK}
                    },
                    {
                        "id": "foreign-sub",
                        "status": "enabled",
                        "type": "stream.online",
                        "version": "1",
                        "condition": {"broadcaster_user_id": "7"},
                        "transport": {"method": "webhook", "callback": "https://other.example.com/hook"}
                    }
                ],
                "total": 2,
                "pagination": {}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let delete_stale = server
        .mock("DELETE", Matcher::Regex(r"^/helix/eventsub/subscriptions".to_string()))
        .match_query(Matcher::UrlEncoded("id".into(), "stale-sub".into()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/helix/eventsub/subscriptions")
        .match_body(Matcher::PartialJson(json!({
            "type": "stream.online",
            "condition": {"broadcaster_user_id": "1337"},
            "transport": {"method": "webhook", "callback": CALLBACK, "secret": WEBHOOK_SECRET}
        })))
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": [{
                    "id": "new-sub",
                    "status": "webhook_callback_verification_pending",
                    "type": "stream.online",
                    "version": "1",
                    "condition": {"broadcaster_user_id": "1337"},
                    "transport": {"method": "webhook", "callback": CALLBACK}
                }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let channels = tempfile::tempdir()?;
    tokio::fs::write(channels.path().join("twitch.txt"), "# tracked\nLeet\n").await?;
    let vars = twitch_env(&server.url(), channels.path());
    assert!(vars["PUBLIC_HOST"].contains(PUBLIC_HOST));
    let service = service(&server.url(), &vars);

    service.sync_subscriptions().await;

    delete_stale.assert_async().await;
    create.assert_async().await;
    Ok(())
}
