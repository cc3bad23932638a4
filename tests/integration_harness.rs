//! End-to-end harness: file and environment configuration flowing through
//! `init` into globally installed providers.
//!
//! Providers dial the collector lazily, so no collector needs to be running.

use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use std::io::Write;
use telemetry_bootstrap::{BootstrapError, ObservabilityConfig};

const CONFIG_TOML: &str = r#"
log_level = "debug"
trace_enable = true
otlp_endpoint = "127.0.0.1:4317"

[export]
timeout = 500
shutdown_timeout = 1000

[resource_attributes]
"deployment.environment" = "test"
"#;

fn load_config() -> ObservabilityConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG_TOML.as_bytes()).unwrap();

    temp_env::with_vars(
        [
            ("TELEMETRY_LOG_PRETTY", Some("true")),
            ("TELEMETRY_OTLP_PASS", None::<&str>),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", None),
        ],
        || ObservabilityConfig::load_from_path(file.path()).unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_lifecycle_installs_and_releases_providers() {
    let config = load_config();
    assert!(config.trace_enable);
    assert!(config.log_pretty);
    assert_eq!(config.export.shutdown_timeout.as_millis(), 1000);

    let guard = telemetry_bootstrap::init(&config, "harness", "workspace").unwrap();
    assert!(guard.tracer_provider().is_some());
    assert!(guard.meter_provider().is_some());

    let fields = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.fields().map(str::to_string).collect::<Vec<_>>()
    });
    assert!(fields.iter().any(|field| field == "traceparent"));
    assert!(fields.iter().any(|field| field == "baggage"));

    let tracer = opentelemetry::global::tracer("harness");
    let mut span = tracer.start("harness-operation");
    assert!(span.span_context().is_valid());
    span.end();

    opentelemetry::global::tracer("harness").in_span("nested", |cx| {
        assert!(cx.span().span_context().is_valid());
    });

    tracing::info!("Logged through the installed subscriber");
    guard.flush();

    let err = telemetry_bootstrap::init(&config, "harness", "workspace").unwrap_err();
    assert!(matches!(err, BootstrapError::AlreadyInitialised));

    // No collector is listening, so exporting the ended spans may fail
    let result = guard.shutdown();
    assert!(matches!(result, Ok(()) | Err(BootstrapError::ShutdownDrain(_))));
}
