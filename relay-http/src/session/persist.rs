use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::Session;

/// Session data stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(flatten)]
    pub session: Session,
    pub updated_at: DateTime<Utc>,
}

type PersistError = Box<dyn std::error::Error + Send + Sync>;

/// Handle session persistence to disk, one JSON file per session
#[derive(Debug, Clone)]
pub struct SessionPersist {
    folder: PathBuf,
}

impl SessionPersist {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.folder.join(format!("{}.json", session_id))
    }

    /// Save a session to disk (atomic write using temp file)
    pub fn save_session(&self, session: &Session) -> Result<(), PersistError> {
        if let Err(e) = fs::create_dir_all(&self.folder) {
            error!("Failed to create session directory: {}", e);
            return Err(e.into());
        }

        let file_path = self.session_file_path(&session.id);
        let session_data = SessionData {
            session: session.clone(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&session_data)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.folder.join(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &file_path)?;

        debug!("Session saved to disk: {}", file_path.display());
        Ok(())
    }

    /// Load a single session from disk by id
    pub fn load_session(&self, session_id: &str) -> Result<SessionData, PersistError> {
        let file_path = self.session_file_path(session_id);
        let content = fs::read_to_string(&file_path)?;
        let session_data: SessionData = serde_json::from_str(&content)?;

        debug!("Loaded session from disk: {}", session_id);
        Ok(session_data)
    }

    /// Load every readable session file, oldest first.
    /// Unreadable files are skipped with a warning.
    pub fn load_all(&self) -> Vec<Session> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No session folder at {}: {}", self.folder.display(), e);
                return Vec::new();
            }
        };

        let mut sessions: Vec<Session> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| {
                let id = path.file_stem()?.to_str()?.to_string();
                match self.load_session(&id) {
                    Ok(data) => Some(data.session),
                    Err(e) => {
                        warn!("Skipping unreadable session file {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();

        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Delete a session file from disk
    pub fn delete_session(&self, session_id: &str) {
        let file_path = self.session_file_path(session_id);

        if file_path.exists() {
            match fs::remove_file(&file_path) {
                Ok(_) => debug!("Deleted session file: {}", file_path.display()),
                Err(e) => error!("Failed to delete session file {:?}: {}", file_path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    #[test]
    fn saved_session_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let persist = SessionPersist::new(dir.path());

        let mut session = Session::new();
        session.turns.push(Turn::user("hello"));
        session.resume_token = Some("r1".into());
        persist.save_session(&session).unwrap();

        let loaded = persist.load_session(&session.id).unwrap();
        assert_eq!(loaded.session.id, session.id);
        assert_eq!(loaded.session.resume_token.as_deref(), Some("r1"));
        assert_eq!(loaded.session.turns[0].content, "hello");
        // no temp files left behind
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn load_all_skips_garbage_and_deleted_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let persist = SessionPersist::new(dir.path());

        let kept = Session::new();
        let removed = Session::new();
        persist.save_session(&kept).unwrap();
        persist.save_session(&removed).unwrap();
        persist.delete_session(&removed.id);
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        let sessions = persist.load_all();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, kept.id);
    }

    #[test]
    fn missing_folder_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let persist = SessionPersist::new(dir.path().join("absent"));
        assert!(persist.load_all().is_empty());
    }
}
