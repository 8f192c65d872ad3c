//! Common test utilities.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use relay_core::{EngineClient, EngineError, EngineStream, InvokeOptions};
use relay_http::{router, ChatDefaults, ServerState, SessionStore, SessionStoreConfig};
use relay_llm::ScriptedEngine;

pub struct TestApp {
    pub router: Router,
    pub store: SessionStore,
}

pub fn test_defaults() -> ChatDefaults {
    ChatDefaults {
        working_dir: PathBuf::from("/tmp/relay-test"),
        ..ChatDefaults::default()
    }
}

/// App backed by an in-memory store and the given engine.
pub fn test_app_with(engine: Arc<dyn EngineClient>) -> TestApp {
    let store = SessionStore::new(SessionStoreConfig::default());
    let state = ServerState::new(store.clone(), engine, test_defaults());
    TestApp {
        router: router(state),
        store,
    }
}

/// App backed by a scripted engine the test can queue replies on.
pub fn test_app() -> (TestApp, Arc<ScriptedEngine>) {
    let engine = Arc::new(ScriptedEngine::new());
    (test_app_with(engine.clone()), engine)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

pub fn chat_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn create_session(app: &Router) -> String {
    let (status, _, body) = send(
        app,
        Request::post("/api/sessions").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    json["session"]["id"].as_str().unwrap().to_string()
}

/// Parse the JSON payload of every `data:` line of an SSE body.
/// Keep-alive comments are ignored.
pub fn parse_frames(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter_map(|event| {
            event
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .map(|data| serde_json::from_str(data.trim()).unwrap())
        })
        .collect()
}

/// Engine whose invocations hold back their events after the first
/// `open_events` until a permit is released.
pub struct GatedEngine {
    pub inner: ScriptedEngine,
    pub gate: Arc<Semaphore>,
    open_events: usize,
}

impl GatedEngine {
    pub fn new() -> Self {
        Self::opening_after(0)
    }

    pub fn opening_after(open_events: usize) -> Self {
        Self {
            inner: ScriptedEngine::new(),
            gate: Arc::new(Semaphore::new(0)),
            open_events,
        }
    }
}

#[async_trait]
impl EngineClient for GatedEngine {
    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<EngineStream, EngineError> {
        let mut events = self.inner.invoke(prompt, options).await?;
        let gate = self.gate.clone();
        let open_events = self.open_events;
        Ok(Box::pin(async_stream::stream! {
            let mut sent = 0;
            let mut permit = None;
            while let Some(event) = events.next().await {
                if sent >= open_events && permit.is_none() {
                    permit = Some(gate.clone().acquire_owned().await);
                }
                sent += 1;
                yield event;
            }
        }))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}
