use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/**
 * One async mutex per service name
 * Holding the guard means no other operation on that name is executing;
 * later callers queue in arrival order
 */
#[derive(Default)]
pub struct ServiceLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ServiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        self.lock_for(name).lock_owned().await
    }

    /**
     * Take the lock only if nobody holds it
     */
    pub fn try_acquire(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        self.lock_for(name).try_lock_owned().ok()
    }

    /// True while an operation on `name` holds its lock.
    pub fn is_busy(&self, name: &str) -> bool {
        self.lock_for(name).try_lock().is_err()
    }
}
