//! Integration tests for the session and chat HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};

mod common;
use common::{chat_request, create_session, send, test_app};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = test_app();

    let (status, _, body) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

// ============================================================================
// Sessions API
// ============================================================================

#[tokio::test]
async fn create_session_returns_id_and_timestamp() {
    let (app, _) = test_app();

    let (status, _, body) = send(
        &app.router,
        Request::post("/api/sessions").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["session"]["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(json["session"]["createdAt"].as_i64().is_some());
}

#[tokio::test]
async fn list_sessions_in_creation_order_with_message_counts() {
    let (app, engine) = test_app();
    let first = create_session(&app.router).await;
    let second = create_session(&app.router).await;

    engine.push_reply("Hi", "r1");
    send(&app.router, chat_request(json!({"sessionId": second, "message": "hello"}))).await;

    let (status, _, body) = send(
        &app.router,
        Request::get("/api/sessions").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["id"], first.as_str());
    assert_eq!(sessions[0]["messageCount"], 0);
    assert_eq!(sessions[1]["id"], second.as_str());
    assert_eq!(sessions[1]["messageCount"], 2);
}

#[tokio::test]
async fn get_session_returns_messages() {
    let (app, engine) = test_app();
    let id = create_session(&app.router).await;

    engine.push_reply("Hi there", "r1");
    send(&app.router, chat_request(json!({"sessionId": id, "message": "hello"}))).await;

    let (status, _, body) = send(
        &app.router,
        Request::get(format!("/api/sessions/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["session"]["id"], id.as_str());
    let messages = json["session"]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "hello");
    assert!(messages[0]["timestamp"].as_i64().is_some());
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hi there");
}

#[tokio::test]
async fn get_unknown_session_is_404() {
    let (app, _) = test_app();

    let (status, _, body) = send(
        &app.router,
        Request::get("/api/sessions/nonexistent").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, json!({"success": false, "error": "Session not found"}));
}

#[tokio::test]
async fn delete_session_then_404() {
    let (app, _) = test_app();
    let id = create_session(&app.router).await;
    let delete = || {
        Request::delete(format!("/api/sessions/{}", id))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, body) = send(&app.router, delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"success": true}));

    let (status, _, body) = send(&app.router, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"success": false, "error": "Session not found"})
    );
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn default_store_keeps_every_session() {
    let (app, engine) = test_app();
    let first = create_session(&app.router).await;
    engine.push_reply("Hi", "r1");
    send(&app.router, chat_request(json!({"sessionId": first, "message": "hello"}))).await;

    for _ in 0..100 {
        create_session(&app.router).await;
    }

    let (status, _, body) = send(
        &app.router,
        Request::get(format!("/api/sessions/{}", first)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["session"]["messages"].as_array().unwrap().len(), 2);
    assert_eq!(app.store.len().await, 101);
    assert_eq!(
        app.store.get(&first).await.unwrap().resume_token.as_deref(),
        Some("r1")
    );
}

// ============================================================================
// Chat validation
// ============================================================================

#[tokio::test]
async fn chat_requires_session_id_and_message() {
    let (app, engine) = test_app();
    let id = create_session(&app.router).await;

    for body in [
        json!({}),
        json!({"sessionId": id}),
        json!({"message": "hello"}),
        json!({"sessionId": id, "message": ""}),
    ] {
        let (status, _, body) = send(&app.router, chat_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"success": false, "error": "sessionId and message are required"})
        );
    }
    assert!(engine.calls().is_empty());
    assert!(app.store.get(&id).await.unwrap().turns.is_empty());
}

#[tokio::test]
async fn unreadable_chat_body_is_treated_as_empty() {
    let (app, engine) = test_app();
    let id = create_session(&app.router).await;
    let valid = json!({"sessionId": id, "message": "hello"}).to_string();

    let requests = [
        // malformed JSON
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"sessionId": "#))
            .unwrap(),
        // no content type
        Request::post("/api/chat").body(Body::from(valid.clone())).unwrap(),
        // wrong content type
        Request::post("/api/chat")
            .header("content-type", "text/plain")
            .body(Body::from(valid))
            .unwrap(),
        // no body
        Request::post("/api/chat").body(Body::empty()).unwrap(),
    ];

    for request in requests {
        let (status, _, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"success": false, "error": "sessionId and message are required"})
        );
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn chat_on_unknown_session_is_404_without_frames() {
    let (app, engine) = test_app();

    let (status, headers, body) = send(
        &app.router,
        chat_request(json!({"sessionId": "nonexistent", "message": "hello"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
    assert!(!body.contains("data:"));
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"success": false, "error": "Session not found"})
    );
    assert!(engine.calls().is_empty());
}
