//! Single-instance dispatch.
//!
//! [`Guard`] turns a job invocation into acquire, run, release. It holds the
//! backend selected at configuration time plus the queue-wide defaults, and
//! is handed to whatever runs jobs. Nothing is looked up globally.

use std::future::Future;
use std::time::Instant;

use opentelemetry::KeyValue;
use secrecy::ExposeSecret;
use tracing::{Instrument, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::identity::JobIdentity;
use crate::lock::{Backend, LockManager};
use crate::model::{Job, JobCall, SingleInstance, TimeLimits};
use crate::telemetry::guard::{record_outcome, start_guard_span};
use crate::telemetry::metrics;
use crate::timeout::TimeoutPolicy;

/// Runs job bodies under a per-identity lease.
#[derive(Clone)]
pub struct Guard {
    backend: Backend,
    namespace: String,
    defaults: TimeLimits,
}

impl Guard {
    pub fn new(backend: Backend, namespace: impl Into<String>, defaults: TimeLimits) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            defaults,
        }
    }

    /// Select and connect the backend for the configured store.
    ///
    /// # Errors
    ///
    /// [`crate::error::Error::UnsupportedBackend`] before any network
    /// access if the store has no lock backend; connection errors otherwise.
    pub async fn connect(config: &Config) -> Result<Self> {
        let kind = config.store_kind()?;
        let backend = Backend::connect(kind, config.store_url.expose_secret()).await?;
        info!(store = %kind, namespace = %config.namespace, "single-instance guard ready");
        Ok(Self::new(backend, config.namespace.clone(), config.global_limits))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn defaults(&self) -> TimeLimits {
        self.defaults
    }

    /// Lease duration an invocation of `job` would get.
    pub fn timeout_for(&self, job: &Job, options: &SingleInstance) -> TimeoutPolicy {
        TimeoutPolicy::resolve(options.lock_timeout, job.limits(), self.defaults)
    }

    /// Run `body` only if no other invocation with the same identity holds
    /// the lease.
    ///
    /// The body's output is returned as-is; a body returning `Result` keeps
    /// its own error inside `Ok`. The lease is released after the body
    /// finishes, and also if the body panics or this future is dropped.
    ///
    /// # Errors
    ///
    /// [`crate::error::Error::AlreadyLocked`] without calling `body` when
    /// the lease is held elsewhere; store errors from acquire or release.
    pub async fn run<F, Fut, R>(
        &self,
        job: &Job,
        call: &JobCall,
        options: &SingleInstance,
        body: F,
    ) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let identity = JobIdentity::derive(&job.name, call, options.include_args);
        let timeout = self.timeout_for(job, options);
        let key = identity.lock_key(&self.namespace);
        let span = start_guard_span(&job.name, &identity, &key, timeout);

        async {
            let manager = LockManager::new(self.backend.clone(), identity, key, timeout);
            let lease = match manager.acquire().await {
                Ok(lease) => lease,
                Err(e) if e.is_already_locked() => {
                    record_outcome(&span, "already_locked");
                    info!("another instance is running, skipping");
                    return Err(e);
                }
                Err(e) => {
                    record_outcome(&span, "error");
                    warn!("lock acquisition failed: {e}");
                    return Err(e);
                }
            };

            let started = Instant::now();
            let output = body().await;
            metrics::job_duration_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                &[KeyValue::new("job", job.name.clone())],
            );

            if let Err(e) = lease.release().await {
                record_outcome(&span, "error");
                warn!("lock release failed: {e}");
                return Err(e);
            }

            record_outcome(&span, "completed");
            Ok(output)
        }
        .instrument(span.clone())
        .await
    }
}

/// A job with its single-instance options bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedJob {
    job: Job,
    options: SingleInstance,
}

impl GuardedJob {
    pub fn new(job: Job, options: SingleInstance) -> Self {
        Self { job, options }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn options(&self) -> &SingleInstance {
        &self.options
    }

    pub fn identity(&self, call: &JobCall) -> JobIdentity {
        JobIdentity::derive(&self.job.name, call, self.options.include_args)
    }

    /// One invocation through `guard`. See [`Guard::run`].
    pub async fn run<F, Fut, R>(&self, guard: &Guard, call: &JobCall, body: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        guard.run(&self.job, call, &self.options, body).await
    }
}
