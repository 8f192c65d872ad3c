use std::time::Instant;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Exclusive right to run an invocation on one session.
pub type InvocationLock = OwnedMutexGuard<()>;

/// Request-scoped state of one chat invocation. Holds the session's
/// invocation lock until it is dropped, which happens when the response
/// stream ends or the client goes away.
pub struct InvocationLifecycle {
    session_id: String,
    _lock: InvocationLock,
    started: Instant,
    finished: bool,
}

impl InvocationLifecycle {
    pub fn new(session_id: String, lock: InvocationLock) -> Self {
        Self {
            session_id,
            _lock: lock,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Mark that the terminal frame has been produced.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for InvocationLifecycle {
    fn drop(&mut self) {
        if self.finished {
            debug!(
                "[{}] Invocation completed in {:?}, releasing session lock",
                self.session_id,
                self.started.elapsed()
            );
        } else {
            info!(
                "[{}] Invocation abandoned after {:?} (client disconnected), releasing session lock",
                self.session_id,
                self.started.elapsed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn dropping_the_lifecycle_releases_the_lock() {
        let lock = Arc::new(Mutex::new(()));
        let mut lifecycle = InvocationLifecycle::new("s1".into(), lock.clone().lock_owned().await);
        assert!(lock.try_lock().is_err());
        assert!(!lifecycle.is_finished());

        lifecycle.finish();
        assert!(lifecycle.is_finished());
        drop(lifecycle);
        assert!(lock.try_lock().is_ok());
    }
}
