use axum::extract::{Path, State};
use tracing::info;

use super::types::{
    CreateSessionResponse, DeleteSessionResponse, GetSessionResponse, ListSessionsResponse,
};
use crate::{ApiError, ApiJson, ServerState};

/// POST /api/sessions
pub async fn create_session(State(state): State<ServerState>) -> ApiJson<CreateSessionResponse> {
    let session = state.sessions.create().await;

    ApiJson(CreateSessionResponse {
        success: true,
        session: (&session).into(),
    })
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<ServerState>) -> ApiJson<ListSessionsResponse> {
    let sessions = state
        .sessions
        .list()
        .await
        .into_iter()
        .map(Into::into)
        .collect();

    ApiJson(ListSessionsResponse {
        success: true,
        sessions,
    })
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<ApiJson<GetSessionResponse>, ApiError> {
    let session = state.sessions.get(&session_id).await?;

    Ok(ApiJson(GetSessionResponse {
        success: true,
        session: session.into(),
    }))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<ApiJson<DeleteSessionResponse>, ApiError> {
    info!("[{}] DELETE /api/sessions", session_id);

    if !state.sessions.delete(&session_id).await {
        return Err(ApiError::NotFound);
    }
    Ok(ApiJson(DeleteSessionResponse { success: true }))
}
