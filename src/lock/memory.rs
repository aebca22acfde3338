//! In-process lease backend.
//!
//! One map behind a mutex gives the same create-if-absent-with-expiry
//! contract as the networked stores, scoped to a single process. Clones
//! share the map.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::LockBackend;
use crate::error::{Error, Result};

/// Deadline used when `now + ttl` is not representable.
const MAX_LEASE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct MemoryLease {
    token: String,
    expires_at: Instant,
}

impl MemoryLease {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    leases: Arc<Mutex<HashMap<String, MemoryLease>>>,
    #[cfg(test)]
    stall_next_release: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live leases.
    pub fn live_count(&self) -> Result<usize> {
        let now = Instant::now();
        let leases = self.map()?;
        Ok(leases.values().filter(|l| l.is_live(now)).count())
    }

    /// Drop expired entries. Returns how many went away.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut leases = self.map()?;
        let before = leases.len();
        leases.retain(|_, l| l.is_live(now));
        Ok(before - leases.len())
    }

    /// Poison the map so every later call fails like a dead store.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let leases = Arc::clone(&self.leases);
        let _ = std::thread::spawn(move || {
            let _held = leases.lock();
            panic!("poisoning lease map");
        })
        .join();
    }

    /// Make the next `release` hang until its future is dropped.
    #[cfg(test)]
    pub(crate) fn stall_next_release(&self) {
        self.stall_next_release.store(true, Ordering::SeqCst);
    }

    fn map(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryLease>>> {
        self.leases
            .lock()
            .map_err(|_| Error::Other("lease map poisoned".into()))
    }
}

impl LockBackend for MemoryBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.map()?;
        leases.retain(|_, l| l.is_live(now));
        if leases.contains_key(key) {
            return Ok(false);
        }
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_LEASE);
        leases.insert(
            key.to_string(),
            MemoryLease {
                token: token.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<()> {
        #[cfg(test)]
        if self.stall_next_release.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.map()?.remove(key);
        Ok(())
    }

    async fn holder(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .map()?
            .get(key)
            .filter(|l| l.is_live(now))
            .map(|l| l.token.clone()))
    }
}
