use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{InvocationLock, Session, SessionPersist, SessionSummary, Turn};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Configuration for the session store
#[derive(Clone, Debug)]
pub struct SessionStoreConfig {
    /// Soft bound on the number of sessions (None = unlimited, the default).
    /// When reached, the least recently active idle session is evicted to
    /// make room.
    pub max_sessions: Option<usize>,
    /// Sessions idle for longer than this are evicted by `evict_idle`
    /// (None = never).
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: None,
            idle_timeout: None,
        }
    }
}

/// What is on disk for one session. Writers hold the lock while touching
/// the file, so writes for a session never interleave.
#[derive(Default)]
struct DiskState {
    written_revision: u64,
    deleted: bool,
}

/// Disk work captured under the registry lock and applied after it is
/// released.
enum DiskOp {
    Save {
        session: Session,
        revision: u64,
        disk: Arc<StdMutex<DiskState>>,
    },
    Delete {
        session_id: String,
        disk: Arc<StdMutex<DiskState>>,
    },
}

impl DiskOp {
    fn apply(self, persist: &SessionPersist) {
        match self {
            DiskOp::Save {
                session,
                revision,
                disk,
            } => {
                let mut disk = disk.lock().unwrap_or_else(|e| e.into_inner());
                // a newer snapshot already landed, or the session is gone
                if disk.deleted || disk.written_revision >= revision {
                    return;
                }
                match persist.save_session(&session) {
                    Ok(()) => disk.written_revision = revision,
                    Err(e) => warn!("[{}] Failed to persist session: {}", session.id, e),
                }
            }
            DiskOp::Delete { session_id, disk } => {
                let mut disk = disk.lock().unwrap_or_else(|e| e.into_inner());
                disk.deleted = true;
                persist.delete_session(&session_id);
            }
        }
    }
}

struct SessionRecord {
    session: Session,
    seq: u64,
    last_activity: Instant,
    invocation_lock: Arc<Mutex<()>>,
    /// Bumped on every mutation.
    revision: u64,
    disk: Arc<StdMutex<DiskState>>,
}

impl SessionRecord {
    fn new(session: Session, seq: u64) -> Self {
        Self {
            session,
            seq,
            last_activity: Instant::now(),
            invocation_lock: Arc::new(Mutex::new(())),
            revision: 0,
            disk: Arc::new(StdMutex::new(DiskState::default())),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// An invocation currently holds (or waits for) this session.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.invocation_lock) > 1 || self.invocation_lock.try_lock().is_err()
    }
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, SessionRecord>,
    next_seq: u64,
}

impl Registry {
    fn insert(&mut self, session: Session) -> &mut SessionRecord {
        let seq = self.next_seq;
        self.next_seq += 1;
        let record = SessionRecord::new(session, seq);
        match self.sessions.entry(record.session.id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(record);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(record),
        }
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut SessionRecord, SessionError> {
        let record = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        record.touch();
        Ok(record)
    }

    /// Least recently active session that no invocation is using.
    fn lru_idle(&self) -> Option<String> {
        self.sessions
            .values()
            .filter(|r| !r.is_busy())
            .min_by_key(|r| r.last_activity)
            .map(|r| r.session.id.clone())
    }
}

/// Process-lifetime registry of sessions.
///
/// Every operation is atomic with respect to the others. Invocations on one
/// session are serialized through `acquire`; different sessions never
/// contend beyond the short registry lock.
#[derive(Clone)]
pub struct SessionStore {
    registry: Arc<RwLock<Registry>>,
    config: SessionStoreConfig,
    persist: Option<Arc<SessionPersist>>,
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config,
            persist: None,
        }
    }

    /// Store backed by session files, rehydrated from whatever is on disk.
    pub fn with_persist(config: SessionStoreConfig, persist: SessionPersist) -> Self {
        let mut registry = Registry::default();
        for session in persist.load_all() {
            registry.insert(session);
        }
        info!(
            "Restored {} session(s) from {}",
            registry.sessions.len(),
            persist.folder().display()
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            config,
            persist: Some(Arc::new(persist)),
        }
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    /// Snapshot a mutated record for writing. Call with the registry lock held.
    fn snapshot(&self, record: &mut SessionRecord) -> Option<DiskOp> {
        self.persist.as_ref()?;
        record.revision += 1;
        Some(DiskOp::Save {
            session: record.session.clone(),
            revision: record.revision,
            disk: record.disk.clone(),
        })
    }

    fn removal(&self, record: &SessionRecord) -> Option<DiskOp> {
        self.persist.as_ref()?;
        Some(DiskOp::Delete {
            session_id: record.session.id.clone(),
            disk: record.disk.clone(),
        })
    }

    /// Apply disk work on the blocking pool. Never called with the registry
    /// lock held.
    async fn flush(&self, ops: Vec<DiskOp>) {
        let Some(persist) = self.persist.clone() else {
            return;
        };
        if ops.is_empty() {
            return;
        }
        let result = tokio::task::spawn_blocking(move || {
            for op in ops {
                op.apply(&persist);
            }
        })
        .await;
        if let Err(e) = result {
            warn!("Session persistence task failed: {}", e);
        }
    }

    /// Register a fresh session. Never fails.
    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut ops = Vec::new();
        {
            let mut registry = self.registry.write().await;

            if let Some(max) = self.config.max_sessions {
                if registry.sessions.len() >= max {
                    let victim = registry
                        .lru_idle()
                        .and_then(|id| registry.sessions.remove(&id));
                    match victim {
                        Some(record) => {
                            ops.extend(self.removal(&record));
                            info!(
                                "[{}] Session evicted to stay within {} sessions",
                                record.session.id, max
                            );
                        }
                        None => warn!(
                            "All {} sessions are busy, exceeding the configured maximum",
                            registry.sessions.len()
                        ),
                    }
                }
            }

            let record = registry.insert(session.clone());
            ops.extend(self.snapshot(record));
        }

        self.flush(ops).await;
        info!("[{}] Session created", session.id);
        session
    }

    pub async fn get(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut registry = self.registry.write().await;
        Ok(registry.record_mut(session_id)?.session.clone())
    }

    /// Summaries of all sessions, in creation order.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let registry = self.registry.read().await;
        let mut records: Vec<&SessionRecord> = registry.sessions.values().collect();
        records.sort_by_key(|r| r.seq);
        records
            .into_iter()
            .map(|r| SessionSummary::from(&r.session))
            .collect()
    }

    /// Remove a session. Returns whether it existed.
    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.registry.write().await.sessions.remove(session_id);
        let Some(record) = removed else {
            return false;
        };
        self.flush(self.removal(&record).into_iter().collect()).await;
        info!("[{}] Session deleted", session_id);
        true
    }

    pub async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<(), SessionError> {
        let op = {
            let mut registry = self.registry.write().await;
            let record = registry.record_mut(session_id)?;
            record.session.turns.push(turn);
            self.snapshot(record)
        };
        self.flush(op.into_iter().collect()).await;
        Ok(())
    }

    pub async fn set_resume_token(&self, session_id: &str, token: String) -> Result<(), SessionError> {
        let op = {
            let mut registry = self.registry.write().await;
            let record = registry.record_mut(session_id)?;
            debug!("[{}] Resume token set to {}", session_id, token);
            record.session.resume_token = Some(token);
            self.snapshot(record)
        };
        self.flush(op.into_iter().collect()).await;
        Ok(())
    }

    /// Wait for exclusive use of a session for one invocation.
    /// The registry lock is released before waiting, so other sessions are
    /// unaffected by a long-running invocation here.
    pub async fn acquire(&self, session_id: &str) -> Result<InvocationLock, SessionError> {
        let lock = {
            let mut registry = self.registry.write().await;
            registry.record_mut(session_id)?.invocation_lock.clone()
        };
        if lock.try_lock().is_err() {
            debug!("[{}] Waiting for in-flight invocation to finish", session_id);
        }
        Ok(lock.lock_owned().await)
    }

    /// Drop sessions idle for longer than `idle_timeout`. Busy sessions are kept.
    pub async fn evict_idle(&self) -> usize {
        let Some(timeout) = self.config.idle_timeout else {
            return 0;
        };

        let evicted: Vec<SessionRecord> = {
            let mut registry = self.registry.write().await;
            let expired: Vec<String> = registry
                .sessions
                .values()
                .filter(|r| r.last_activity.elapsed() >= timeout && !r.is_busy())
                .map(|r| r.session.id.clone())
                .collect();
            expired
                .iter()
                .filter_map(|id| registry.sessions.remove(id))
                .collect()
        };

        for record in &evicted {
            info!("[{}] Session evicted after {:?} idle", record.session.id, timeout);
        }
        let ops = evicted.iter().filter_map(|r| self.removal(r)).collect();
        self.flush(ops).await;
        evicted.len()
    }

    /// Run `evict_idle` every `period`. No task is spawned when idle eviction
    /// is disabled.
    pub fn spawn_eviction_task(&self, period: Duration) -> Option<JoinHandle<()>> {
        self.config.idle_timeout?;
        let store = self.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    debug!("Idle sweep evicted {} session(s)", evicted);
                }
            }
        }))
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
