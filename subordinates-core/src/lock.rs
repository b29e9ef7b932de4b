//! Process-wide reader/writer lock over the subordinate directory
//!
//! Every hierarchy operation goes through one [`DirectoryLock`]. Readers run
//! concurrently; writers hold the lock for their whole multi-step sequence
//! (decode, validate, write credentials, commit) so the store and the
//! credential area are never observed half-updated.
//!
//! The lock is a handle, not a global: clones share the same underlying
//! lock and counters, and it is passed explicitly to the registry and the
//! manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Acquisition counters
#[derive(Debug, Default)]
pub struct LockStats {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl LockStats {
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryLock {
    inner: Arc<RwLock<()>>,
    stats: Arc<LockStats>,
}

/// Shared access to the directory
#[derive(Debug)]
pub struct DirectoryReadGuard {
    _guard: OwnedRwLockReadGuard<()>,
}

/// Exclusive access to the directory
///
/// Internal write paths take `&DirectoryWriteGuard` as proof the lock is held.
#[derive(Debug)]
pub struct DirectoryWriteGuard {
    _guard: OwnedRwLockWriteGuard<()>,
}

impl DirectoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> DirectoryReadGuard {
        let guard = self.inner.clone().read_owned().await;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        DirectoryReadGuard { _guard: guard }
    }

    pub async fn write(&self) -> DirectoryWriteGuard {
        let guard = self.inner.clone().write_owned().await;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        DirectoryWriteGuard { _guard: guard }
    }

    /// Non-blocking write attempt, `None` while any guard is alive
    pub fn try_write(&self) -> Option<DirectoryWriteGuard> {
        let guard = self.inner.clone().try_write_owned().ok()?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Some(DirectoryWriteGuard { _guard: guard })
    }

    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}
