//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("jobguard")
}

/// Counter: lock acquisition attempts.
/// Labels: `result` ("acquired" | "already_locked" | "error").
pub fn lock_acquisitions() -> Counter<u64> {
    meter()
        .u64_counter("jobguard.lock.acquisitions")
        .with_description("Number of lock acquisition attempts")
        .build()
}

/// Counter: lock releases.
/// Labels: `result` ("ok" | "error").
pub fn lock_releases() -> Counter<u64> {
    meter()
        .u64_counter("jobguard.lock.releases")
        .with_description("Number of lock releases")
        .build()
}

/// Histogram: guarded job body duration in milliseconds.
/// Labels: `job`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobguard.job.duration_ms")
        .with_description("Duration of guarded job bodies in milliseconds")
        .with_unit("ms")
        .build()
}
