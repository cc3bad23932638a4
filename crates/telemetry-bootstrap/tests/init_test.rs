//! Process-level initialisation.
//!
//! `init` installs a global subscriber, so every scenario lives in a single
//! test to keep the ordering deterministic.

use telemetry_bootstrap::{BootstrapError, ObservabilityConfig};

#[tokio::test]
async fn test_init_lifecycle_with_tracing_disabled() {
    let invalid = ObservabilityConfig::builder().log_level("verbose").build();
    let err = telemetry_bootstrap::init(&invalid, "orders", "shop").unwrap_err();
    assert!(matches!(err, BootstrapError::InvalidLogLevel(_)));

    let config = ObservabilityConfig::builder()
        .log_level("debug")
        .trace_enable(false)
        .build();

    let guard = telemetry_bootstrap::init(&config, "orders", "shop").unwrap();
    assert!(guard.tracer_provider().is_none());
    assert!(guard.meter_provider().is_none());

    tracing::info!("Logged through the installed subscriber");
    guard.flush();

    let err = telemetry_bootstrap::init(&config, "orders", "shop").unwrap_err();
    assert!(matches!(err, BootstrapError::AlreadyInitialised));

    guard.shutdown().unwrap();
}
