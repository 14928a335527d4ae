//! Single-writer workspace lock.
//!
//! Staging, subscribing and committing all mutate the working tree and the
//! properties document. They take this lock without waiting: a second
//! mutation arriving while one is in flight fails with
//! [`AhubError::Locked`] instead of queueing behind it.

use std::sync::Arc;

use ahub_core::AhubError;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Non-blocking mutual exclusion for workspace mutations.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one mutation; released on drop.
#[derive(Debug)]
pub struct WorkspaceGuard {
    operation: &'static str,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceGuard {
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl WorkspaceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `operation` or fail immediately.
    ///
    /// # Errors
    ///
    /// [`AhubError::Locked`] when another mutation holds the lock.
    pub fn try_acquire(&self, operation: &'static str) -> Result<WorkspaceGuard, AhubError> {
        match Arc::clone(&self.inner).try_lock_owned() {
            Ok(guard) => {
                tracing::trace!(operation, "workspace lock acquired");
                Ok(WorkspaceGuard {
                    operation,
                    _guard: guard,
                })
            }
            Err(_) => {
                tracing::warn!(operation, "workspace lock contended");
                Err(AhubError::Locked(format!(
                    "cannot {operation} while another operation is in progress"
                )))
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahub_core::ErrorKind;

    #[test]
    fn second_acquire_fails_while_held() {
        let lock = WorkspaceLock::new();
        let guard = lock.try_acquire("commit").unwrap();
        assert_eq!(guard.operation(), "commit");
        assert!(lock.is_locked());

        let err = lock.try_acquire("stage").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
        assert!(err.to_string().contains("stage"));
    }

    #[test]
    fn dropping_the_guard_releases() {
        let lock = WorkspaceLock::new();
        drop(lock.try_acquire("subscribe").unwrap());
        assert!(!lock.is_locked());
        assert!(lock.try_acquire("commit").is_ok());
    }

    #[test]
    fn clones_share_the_lock() {
        let lock = WorkspaceLock::new();
        let other = lock.clone();
        let _guard = lock.try_acquire("commit").unwrap();
        assert!(other.try_acquire("commit").is_err());
    }
}
