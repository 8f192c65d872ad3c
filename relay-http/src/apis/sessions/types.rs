use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::{Session, SessionSummary, Turn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    pub id: String,
    pub message_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub messages: Vec<Turn>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session: SessionRef,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub success: bool,
    pub sessions: Vec<SessionListItem>,
}

#[derive(Debug, Serialize)]
pub struct GetSessionResponse {
    pub success: bool,
    pub session: SessionDetail,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub success: bool,
}

impl From<&Session> for SessionRef {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            created_at: session.created_at,
        }
    }
}

impl From<SessionSummary> for SessionListItem {
    fn from(summary: SessionSummary) -> Self {
        Self {
            id: summary.id,
            message_count: summary.turn_count,
            created_at: summary.created_at,
        }
    }
}

impl From<Session> for SessionDetail {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            messages: session.turns,
            created_at: session.created_at,
        }
    }
}
