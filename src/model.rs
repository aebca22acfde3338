//! Core data model.
//!
//! A job is something the queue runs by name. A call is one invocation's
//! arguments. Single-instance options decide how calls map onto locks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Soft and hard execution limits in seconds. Zero is treated as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLimits {
    #[serde(default)]
    pub soft: Option<u64>,
    #[serde(default)]
    pub hard: Option<u64>,
}

impl TimeLimits {
    pub fn new(soft: Option<u64>, hard: Option<u64>) -> Self {
        Self { soft, hard }
    }
}

/// A job as registered with the task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Registered name (e.g., "reports.send_report"). Stable across workers.
    pub name: String,

    #[serde(default)]
    pub soft_time_limit: Option<u64>,

    #[serde(default)]
    pub hard_time_limit: Option<u64>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soft_time_limit: None,
            hard_time_limit: None,
        }
    }

    pub fn soft_time_limit(mut self, secs: u64) -> Self {
        self.soft_time_limit = Some(secs);
        self
    }

    pub fn hard_time_limit(mut self, secs: u64) -> Self {
        self.hard_time_limit = Some(secs);
        self
    }

    pub fn limits(&self) -> TimeLimits {
        TimeLimits::new(self.soft_time_limit, self.hard_time_limit)
    }
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// Arguments of one job invocation.
///
/// Keyword arguments are kept sorted by key so that two calls built in a
/// different order still compare (and digest) equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCall {
    pub args: Vec<serde_json::Value>,
    pub kwargs: BTreeMap<String, serde_json::Value>,
}

impl JobCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Single-instance options attached to a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleInstance {
    /// Lease duration override in seconds (the margin is still added).
    #[serde(default)]
    pub lock_timeout: Option<u64>,

    /// Lock per distinct argument set instead of per job name.
    #[serde(default)]
    pub include_args: bool,
}

impl SingleInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_timeout(mut self, secs: u64) -> Self {
        self.lock_timeout = Some(secs);
        self
    }

    pub fn include_args(mut self, include: bool) -> Self {
        self.include_args = include;
        self
    }

    /// Bind these options to a job.
    pub fn apply(self, job: Job) -> crate::guard::GuardedJob {
        crate::guard::GuardedJob::new(job, self)
    }
}
