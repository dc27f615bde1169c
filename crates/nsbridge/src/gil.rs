//! Global interpreter lock
//!
//! The host interpreter serializes execution under one critical section.
//! Bridge operations run while it is held; the only producer that may arrive
//! without it is the namespace-added notification, which acquires it through
//! a scoped [`GilGuard`] before touching the registry.
//!
//! The lock is reentrant so a bridge operation invoked from host code that
//! already holds it can acquire it again.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::Arc;

/// Shared handle to the host's global critical section
#[derive(Clone)]
pub struct Gil {
    lock: Arc<ReentrantMutex<()>>,
}

impl Gil {
    /// Create a new, unlocked critical section
    pub fn new() -> Self {
        Self {
            lock: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Acquire the lock for the current scope
    ///
    /// Blocks until no other thread holds it. Released when the guard drops,
    /// including during unwinding.
    pub fn acquire(&self) -> GilGuard<'_> {
        GilGuard {
            _guard: self.lock.lock(),
        }
    }

    /// Try to acquire the lock without blocking
    pub fn try_acquire(&self) -> Option<GilGuard<'_>> {
        self.lock.try_lock().map(|guard| GilGuard { _guard: guard })
    }

    /// Check if any thread currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl Default for Gil {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gil")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Scoped acquisition of the [`Gil`]
pub struct GilGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}
