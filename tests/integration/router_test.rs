//! Router behavior with a Twitch-only configuration

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

use crate::harness::{body_text, call, service, twitch_env, WEBHOOK_SECRET};

async fn mock_token(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "it-app-token", "expires_in": 5011271, "token_type": "bearer"}).to_string())
        .create_async()
        .await
}

fn eventsub_request(message_type: &str, body: &str, secret: &str) -> Request<Body> {
    let signature = TwitchVerifier::new(secret).sign("it-msg-1", "2024-05-01T12:00:00Z", body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/events/twitch")
        .header(MESSAGE_ID_HEADER, "it-msg-1")
        .header(MESSAGE_TIMESTAMP_HEADER, "2024-05-01T12:00:00Z")
        .header(MESSAGE_SIGNATURE_HEADER, signature)
        .header(MESSAGE_TYPE_HEADER, message_type)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

#[tokio::test]
async fn test_health_and_probes() -> Result<()> {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let channels = tempfile::tempdir()?;
    let service = service(&server.url(), &twitch_env(&server.url(), channels.path()));
    let (state, _worker) = service.start().await?;

    let response = call(router(state.clone()), Request::get("/health").body(Body::empty())?).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = call(router(state.clone()), Request::get("/events/twitch").body(Body::empty())?).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Kick is not configured
    let response = call(router(state.clone()), Request::post("/events/kick").body(Body::empty())?).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Dashboard routes only exist with a dashboard secret
    let response = call(router(state), Request::get("/dashboard?secret=x").body(Body::empty())?).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_verification_challenge_round_trip() -> Result<()> {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let channels = tempfile::tempdir()?;
    let service = service(&server.url(), &twitch_env(&server.url(), channels.path()));
    let (state, _worker) = service.start().await?;

    let body = json!({
        "challenge": "pogchamp-kappa-360noscope-vohiyo",
        "subscription": {
            "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
            "status": "webhook_callback_verification_pending",
            "type": "stream.online",
            "version": "1",
            "condition": {"broadcaster_user_id": "12826"}
        }
    })
    .to_string();

    let response = call(
        router(state),
        eventsub_request("webhook_callback_verification", &body, WEBHOOK_SECRET),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "pogchamp-kappa-360noscope-vohiyo");
    Ok(())
}

#[tokio::test]
async fn test_rejections() -> Result<()> {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let channels = tempfile::tempdir()?;
    let service = service(&server.url(), &twitch_env(&server.url(), channels.path()));
    let (state, _worker) = service.start().await?;

    let body = json!({"subscription": {"id": "s", "type": "stream.online"}}).to_string();

    let response = call(router(state.clone()), eventsub_request("notification", &body, "not-the-secret")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let unsigned = Request::post("/events/twitch").body(Body::from(body))?;
    let response = call(router(state), unsigned).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
