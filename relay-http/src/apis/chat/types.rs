use std::path::PathBuf;

use serde::Deserialize;

use crate::ApiError;

pub const MISSING_FIELDS: &str = "sessionId and message are required";

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub working_dir: Option<PathBuf>,
}

impl ChatRequest {
    /// Session id and message, both present and non-empty.
    pub fn required_fields(&self) -> Result<(String, String), ApiError> {
        match (self.session_id.as_deref(), self.message.as_deref()) {
            (Some(session_id), Some(message)) if !session_id.is_empty() && !message.is_empty() => {
                Ok((session_id.to_string(), message.to_string()))
            }
            _ => Err(ApiError::BadRequest(MISSING_FIELDS.to_string())),
        }
    }

    /// Working directory requested by the client; empty counts as absent.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.working_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> ChatRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn both_fields_required() {
        assert!(request(r#"{"sessionId":"s","message":"hi"}"#).required_fields().is_ok());
        assert!(request(r#"{"message":"hi"}"#).required_fields().is_err());
        assert!(request(r#"{"sessionId":"s"}"#).required_fields().is_err());
        assert!(request(r#"{"sessionId":"s","message":""}"#).required_fields().is_err());
    }

    #[test]
    fn empty_working_dir_is_ignored() {
        assert_eq!(request(r#"{"workingDir":""}"#).working_dir(), None);
        assert_eq!(
            request(r#"{"workingDir":"/repo"}"#).working_dir(),
            Some(PathBuf::from("/repo"))
        );
    }
}
