//! The global subscriber can only be installed once per process, so this
//! file holds a single test.

use latency_telemetry::{harness_event, init_telemetry, TelemetryConfig, TelemetryError};

#[test]
fn test_init_once() {
    let config = TelemetryConfig::default().with_log_level("debug");
    let guard = init_telemetry(config.clone()).expect("first init succeeds");
    assert_eq!(guard.service_name(), "order-latency");

    harness_event!(info, "test", "Subscriber installed", attempt = 1);
    harness_event!(debug, "test", iteration = 0usize, "Iteration logged", create_ms = 12u64);
    harness_event!(warn, "test", iteration = 1usize, "Iteration without extra fields");

    let second = init_telemetry(config);
    assert!(matches!(second, Err(TelemetryError::Init(_))));
}
