//! Demo service wired through the observability bootstrap.
//!
//! Loads configuration, initialises logging and the OTLP pipeline, emits a
//! heartbeat span and counter once per interval, and shuts everything down on
//! Ctrl-C.
//!
//! # Environment Variables
//!
//! - `SERVICE_NAME` - service name reported in the resource (defaults to the
//!   binary name)
//! - `SERVICE_NAMESPACE` - service namespace (defaults to `demo`)
//! - `TELEMETRY_*` - see [`ObservabilityConfig`]

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use std::time::Duration;
use telemetry_bootstrap::ObservabilityConfig;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = ObservabilityConfig::load().context("failed to load configuration")?;

    let service_name =
        std::env::var("SERVICE_NAME").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
    let namespace = std::env::var("SERVICE_NAMESPACE").unwrap_or_else(|_| "demo".to_string());

    let guard = telemetry_bootstrap::init(&config, &service_name, &namespace)
        .context("failed to initialise observability")?;
    tracing::debug!(?config, "Configuration loaded");

    let heartbeats = opentelemetry::global::meter(env!("CARGO_PKG_NAME"))
        .u64_counter("demo.heartbeats")
        .with_description("Heartbeats emitted by the demo service")
        .build();

    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _span = tracing::info_span!("heartbeat", service = %service_name).entered();
                heartbeats.add(1, &[KeyValue::new("service.name", service_name.clone())]);
                tracing::info!("Heartbeat");
            }
            signal = &mut shutdown => {
                signal.context("failed to listen for shutdown signal")?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = guard.shutdown() {
        tracing::error!(target: "otel_lifecycle", error = %e, "Telemetry shutdown failed");
    }

    Ok(())
}
