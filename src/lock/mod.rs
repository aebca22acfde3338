//! Distributed lease locking.
//!
//! A [`LockManager`] guards exactly one job invocation. It makes a single
//! atomic create-if-absent-with-expiry write against the shared store and
//! either hands back a [`Lease`] or fails with [`Error::AlreadyLocked`].
//! It never retries and never waits: contention is terminal for the
//! invocation, and the task queue decides whether to resubmit.
//!
//! The store is reached through [`LockBackend`]. Backends are chosen once,
//! from the configured store URL, via [`StoreKind`]. Stores without an
//! atomic create-if-absent primitive have no variant and are rejected.

pub mod memory;
pub mod redis;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::identity::JobIdentity;
use crate::telemetry::metrics;
use crate::timeout::TimeoutPolicy;
use opentelemetry::KeyValue;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

// ---------------------------------------------------------------------------
// Backend capability
// ---------------------------------------------------------------------------

/// A named-lock store with atomic create-if-absent-with-expiry.
pub trait LockBackend: Send + Sync {
    /// Store `token` under `key` for `ttl` only if no live entry exists.
    /// Returns `false` when the key is already held.
    fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete `key`, whoever holds it.
    fn release(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Token of the live lease under `key`, if any.
    fn holder(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Store kinds with a lock backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Redis,
    Postgres,
    Memory,
}

impl StoreKind {
    /// Pick the store kind from a connection URL's scheme.
    ///
    /// Any scheme mentioning redis (`redis`, `rediss`, `redis+unix`) selects
    /// Redis. Only the scheme ends up in the error, never the URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split_once("://").map_or(url, |(scheme, _)| scheme);
        let lower = scheme.to_ascii_lowercase();
        if lower.contains("redis") {
            Ok(StoreKind::Redis)
        } else if lower == "postgres" || lower == "postgresql" {
            Ok(StoreKind::Postgres)
        } else if lower == "memory" {
            Ok(StoreKind::Memory)
        } else {
            Err(Error::UnsupportedBackend {
                scheme: scheme.to_string(),
            })
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreKind::Redis => "redis",
            StoreKind::Postgres => "postgres",
            StoreKind::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

/// The configured lock backend.
#[derive(Clone)]
pub enum Backend {
    Redis(RedisBackend),
    Postgres(Db),
    Memory(MemoryBackend),
}

impl Backend {
    /// Connect the backend for `kind` to the store at `url`.
    pub async fn connect(kind: StoreKind, url: &str) -> Result<Self> {
        match kind {
            StoreKind::Redis => Ok(Backend::Redis(RedisBackend::connect(url).await?)),
            StoreKind::Postgres => {
                let db = Db::connect(url).await?;
                db.migrate().await?;
                Ok(Backend::Postgres(db))
            }
            StoreKind::Memory => Ok(Backend::Memory(MemoryBackend::new())),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            Backend::Redis(_) => StoreKind::Redis,
            Backend::Postgres(_) => StoreKind::Postgres,
            Backend::Memory(_) => StoreKind::Memory,
        }
    }
}

impl LockBackend for Backend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        match self {
            Backend::Redis(b) => b.try_acquire(key, token, ttl).await,
            Backend::Postgres(b) => b.try_acquire(key, token, ttl).await,
            Backend::Memory(b) => b.try_acquire(key, token, ttl).await,
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        match self {
            Backend::Redis(b) => b.release(key).await,
            Backend::Postgres(b) => b.release(key).await,
            Backend::Memory(b) => b.release(key).await,
        }
    }

    async fn holder(&self, key: &str) -> Result<Option<String>> {
        match self {
            Backend::Redis(b) => b.holder(key).await,
            Backend::Postgres(b) => b.holder(key).await,
            Backend::Memory(b) => b.holder(key).await,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle of one invocation's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    /// Nothing attempted yet.
    Idle,
    /// The acquire write is in flight.
    Acquiring,
    /// This invocation owns the lease.
    Held,
    /// Lease deleted. Terminal.
    Released,
    /// Someone else owns the lease. Terminal, nothing to clean up.
    Rejected,
}

impl LockState {
    pub fn can_transition_to(self, to: LockState) -> bool {
        use LockState::*;
        matches!(
            (self, to),
            (Idle, Acquiring)
                | (Acquiring, Held)
                | (Acquiring, Rejected)
                | (Acquiring, Idle) // store unreachable
                | (Held, Released)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LockState::Released | LockState::Rejected)
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LockState::Idle => "idle",
            LockState::Acquiring => "acquiring",
            LockState::Held => "held",
            LockState::Released => "released",
            LockState::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

fn transition(state: &mut LockState, to: LockState) -> Result<()> {
    if state.can_transition_to(to) {
        *state = to;
        Ok(())
    } else {
        Err(Error::InvalidTransition { from: *state, to })
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Lock for a single job invocation.
pub struct LockManager {
    backend: Backend,
    identity: JobIdentity,
    key: String,
    timeout: TimeoutPolicy,
    state: LockState,
}

impl LockManager {
    pub fn new(
        backend: Backend,
        identity: JobIdentity,
        key: impl Into<String>,
        timeout: TimeoutPolicy,
    ) -> Self {
        Self {
            backend,
            identity,
            key: key.into(),
            timeout,
            state: LockState::Idle,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Try once to take the lease.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyLocked`] if another invocation holds it; store
    /// errors are passed through untouched.
    pub async fn acquire(mut self) -> Result<Lease> {
        transition(&mut self.state, LockState::Acquiring)?;
        debug!(timeout = %self.timeout, key = %self.key, "acquiring lock");

        let token = uuid::Uuid::new_v4().to_string();
        let acquired = match self
            .backend
            .try_acquire(&self.key, &token, self.timeout.as_duration())
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                transition(&mut self.state, LockState::Idle)?;
                record_acquisition("error");
                return Err(e);
            }
        };

        if !acquired {
            transition(&mut self.state, LockState::Rejected)?;
            record_acquisition("already_locked");
            debug!(identity = %self.identity, "another instance is running");
            return Err(Error::AlreadyLocked {
                identity: self.identity.to_string(),
            });
        }

        transition(&mut self.state, LockState::Held)?;
        record_acquisition("acquired");
        debug!(identity = %self.identity, "got lock, running");

        Ok(Lease {
            backend: self.backend,
            identity: self.identity,
            key: self.key,
            token,
            timeout: self.timeout,
            acquired_at: Utc::now(),
            state: self.state,
        })
    }
}

fn record_acquisition(result: &'static str) {
    metrics::lock_acquisitions().add(1, &[KeyValue::new("result", result)]);
}

fn record_release(result: &'static str) {
    metrics::lock_releases().add(1, &[KeyValue::new("result", result)]);
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// A held lease.
///
/// Call [`Lease::release`] when the job finishes. A lease dropped while
/// still held (panic, cancelled future) schedules the release on the
/// current tokio runtime; with no runtime the TTL reclaims it.
pub struct Lease {
    backend: Backend,
    identity: JobIdentity,
    key: String,
    token: String,
    timeout: TimeoutPolicy,
    acquired_at: DateTime<Utc>,
    state: LockState,
}

impl Lease {
    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn timeout(&self) -> TimeoutPolicy {
        self.timeout
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Delete the lease from the store.
    ///
    /// The lease stays `Held` until the store answers, so a release
    /// cancelled mid-flight is retried by `Drop`.
    pub async fn release(mut self) -> Result<()> {
        debug!(key = %self.key, "releasing lock");
        let released = self.backend.release(&self.key).await;
        transition(&mut self.state, LockState::Released)?;
        match released {
            Ok(()) => {
                record_release("ok");
                Ok(())
            }
            Err(e) => {
                record_release("error");
                Err(e)
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.state != LockState::Held {
            return;
        }
        self.state = LockState::Released;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "lease dropped outside a runtime, left to expire");
            return;
        };

        warn!(key = %self.key, "lease dropped while held, releasing in background");
        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            match backend.release(&key).await {
                Ok(()) => record_release("ok"),
                Err(e) => {
                    record_release("error");
                    warn!(%key, "background release failed: {e}");
                }
            }
        });
    }
}
