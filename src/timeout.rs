//! Lock lease duration.
//!
//! The lease must outlive the job it protects, but not by much: if the
//! worker dies, the lease is the only thing keeping other workers out.

use std::time::Duration;

use crate::model::TimeLimits;

/// Used when neither the caller, the job, nor the runtime declares a limit.
pub const LAST_RESORT_SECS: u64 = 60 * 5;

/// Added to every resolved timeout so a job slightly overrunning its own
/// limit still holds the lease until the scheduler kills it.
pub const MARGIN_SECS: u64 = 5;

/// Resolved lease duration for one job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutPolicy {
    secs: u64,
}

impl TimeoutPolicy {
    /// Resolve from the invocation's candidate sources.
    pub fn resolve(explicit: Option<u64>, job: TimeLimits, global: TimeLimits) -> Self {
        Self {
            secs: resolve(explicit, job.soft, job.hard, global.soft, global.hard),
        }
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }
}

impl std::fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.secs)
    }
}

/// Effective lock timeout in seconds.
///
/// First set, non-zero value wins: explicit override, job soft limit, job
/// hard limit, global soft default, global hard default, then
/// [`LAST_RESORT_SECS`]. [`MARGIN_SECS`] is always added.
pub fn resolve(
    explicit: Option<u64>,
    job_soft: Option<u64>,
    job_hard: Option<u64>,
    global_soft: Option<u64>,
    global_hard: Option<u64>,
) -> u64 {
    let chosen = [explicit, job_soft, job_hard, global_soft, global_hard]
        .into_iter()
        .flatten()
        .find(|&secs| secs > 0)
        .unwrap_or(LAST_RESORT_SECS);
    chosen.saturating_add(MARGIN_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_limit_alone_gets_margin() {
        assert_eq!(resolve(None, None, Some(30), None, None), 35);
    }

    #[test]
    fn nothing_set_falls_back_to_last_resort() {
        assert_eq!(resolve(None, None, None, None, None), 305);
    }

    #[test]
    fn zero_counts_as_unset() {
        assert_eq!(resolve(Some(0), Some(0), None, Some(0), Some(90)), 95);
    }

    #[test]
    fn precedence_order() {
        let all = |explicit| resolve(explicit, Some(20), Some(30), Some(40), Some(50));
        assert_eq!(all(Some(10)), 15);
        assert_eq!(all(None), 25);
        assert_eq!(resolve(None, None, Some(30), Some(40), Some(50)), 35);
        assert_eq!(resolve(None, None, None, Some(40), Some(50)), 45);
        assert_eq!(resolve(None, None, None, None, Some(50)), 55);
    }

    #[test]
    fn never_overflows() {
        assert_eq!(resolve(Some(u64::MAX), None, None, None, None), u64::MAX);
    }

    #[test]
    fn policy_from_limits() {
        let job = TimeLimits {
            soft: None,
            hard: Some(120),
        };
        let policy = TimeoutPolicy::resolve(None, job, TimeLimits::default());
        assert_eq!(policy.secs(), 125);
        assert_eq!(policy.as_duration(), Duration::from_secs(125));
        assert_eq!(policy.to_string(), "125s");
    }
}
