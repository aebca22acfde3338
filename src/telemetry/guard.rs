//! Span helpers for guarded job invocations.

use tracing::Span;

use crate::identity::JobIdentity;
use crate::timeout::TimeoutPolicy;

/// Start the span wrapping one guarded invocation.
///
/// `lock.outcome` is declared empty and filled by [`record_outcome`].
pub fn start_guard_span(
    job: &str,
    identity: &JobIdentity,
    key: &str,
    timeout: TimeoutPolicy,
) -> Span {
    tracing::info_span!(
        "job.single_instance",
        "job.name" = job,
        "job.identity" = %identity,
        "lock.key" = key,
        "lock.ttl_secs" = timeout.secs(),
        "lock.outcome" = tracing::field::Empty,
    )
}

/// Record how the invocation ended: "completed", "already_locked" or "error".
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("lock.outcome", outcome);
}
