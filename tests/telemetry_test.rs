//! Integration tests for telemetry initialization and span helpers.

use jobguard::config::Config;
use jobguard::identity::JobIdentity;
use jobguard::model::TimeLimits;
use jobguard::telemetry::{TelemetryConfig, guard, init_telemetry, metrics};
use jobguard::timeout::TimeoutPolicy;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init in the same binary may fail, which is acceptable here.
    let config = TelemetryConfig::new("jobguard-test");
    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
    }
}

#[test]
fn guard_span_creates_and_records_outcome() {
    let identity = JobIdentity::for_name("send_report");
    let key = identity.lock_key("ns");
    let timeout = TimeoutPolicy::resolve(Some(10), TimeLimits::default(), TimeLimits::default());
    let span = guard::start_guard_span("send_report", &identity, &key, timeout);
    guard::record_outcome(&span, "already_locked");
}

#[test]
fn metrics_instruments_are_usable_without_provider() {
    metrics::lock_acquisitions().add(1, &[]);
    metrics::lock_releases().add(1, &[]);
    metrics::job_duration_ms().record(12.5, &[]);
}

#[test]
fn telemetry_config_follows_worker_config() {
    let mut config = Config::for_store("memory://");
    config.otel_endpoint = Some("http://collector:4317".to_string());
    config.log_level = "jobguard=debug,warn".to_string();

    let telemetry = TelemetryConfig::from_config(&config, "billing-worker");
    assert_eq!(telemetry.endpoint.as_deref(), Some("http://collector:4317"));
    assert_eq!(telemetry.default_filter, "jobguard=debug,warn");
    assert_eq!(telemetry.service_name, "billing-worker");

    let defaults = TelemetryConfig::from_config(&Config::for_store("memory://"), "w");
    assert_eq!(defaults.endpoint, None);
    assert_eq!(defaults.default_filter, "info");
}
