use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use futures::{Stream, StreamExt};
use relay_core::{EngineClient, InvokeOptions};
use tracing::{debug, error, info};

use super::formatter::ChatFormatter;
use super::types::ChatRequest;
use crate::session::{InvocationLifecycle, SessionStore, Turn};
use crate::streaming::create_sse_stream;
use crate::translator::{translate, WireFrame};
use crate::{ApiError, ServerState};

/// POST /api/chat
///
/// Validation and session lookup failures are answered with a JSON error
/// envelope. An unreadable body counts as an empty one. Once the session is
/// locked and the user turn recorded, the response becomes an SSE stream of
/// wire frames ending with exactly one `done` or `error` frame.
pub async fn handle_chat(
    State(state): State<ServerState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Unreadable chat body: {}", rejection.body_text());
            ChatRequest::default()
        }
    };
    let (session_id, message) = payload.required_fields()?;

    info!("[{}] POST /api/chat", session_id);

    // Waits here while another invocation runs on the same session.
    let lock = state.sessions.acquire(&session_id).await?;
    let lifecycle = InvocationLifecycle::new(session_id.clone(), lock);

    state
        .sessions
        .append_turn(&session_id, Turn::user(&message))
        .await?;

    // Read after locking so the token of the previous turn is seen.
    let session = state.sessions.get(&session_id).await?;
    let options = state
        .chat
        .invoke_options(payload.working_dir(), session.resume_token.clone());

    debug!("[{}] Message: {}", session_id, message);
    debug!("[{}] Working directory: {}", session_id, options.cwd.display());
    debug!(
        "[{}] Resume token: {}",
        session_id,
        options.resume.as_deref().unwrap_or("new session")
    );

    let frames = run_invocation(
        state.engine.clone(),
        state.sessions.clone(),
        lifecycle,
        message,
        options,
    );

    Ok(create_sse_stream(frames, ChatFormatter))
}

/// Start the engine and translate its events. Failing to start the engine
/// becomes the single terminal `error` frame of the stream.
fn run_invocation(
    engine: Arc<dyn EngineClient>,
    store: SessionStore,
    lifecycle: InvocationLifecycle,
    prompt: String,
    options: InvokeOptions,
) -> impl Stream<Item = WireFrame> + Send + 'static {
    async_stream::stream! {
        let mut lifecycle = lifecycle;

        let events = match engine.invoke(&prompt, options).await {
            Ok(events) => events,
            Err(e) => {
                error!("[{}] Failed to start {} engine: {}", lifecycle.session_id(), engine.name(), e);
                lifecycle.finish();
                yield WireFrame::error(e.to_string());
                return;
            }
        };

        let frames = translate(store, lifecycle, events);
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            yield frame;
        }
    }
}
