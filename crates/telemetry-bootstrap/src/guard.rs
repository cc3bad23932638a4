//! Process-wide observability lifecycle.
//!
//! [`init`] configures the logger and, when enabled, the OTLP trace and metric
//! pipeline. The returned [`ObservabilityGuard`] releases every provider when
//! shut down or dropped.

use crate::bootstrap::{Bootstrap, OtlpTelemetry};
use crate::config::ObservabilityConfig;
use crate::error::BootstrapError;
use crate::logging::{LogLevel, init_subscriber};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once the first `init` gets past configuration validation.
static INITIALISED: AtomicBool = AtomicBool::new(false);

const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

/// Initialises logging and, if enabled, tracing and metrics export.
///
/// Call once per process, inside a Tokio runtime. Failures are logged before
/// being returned; the caller is expected to treat them as fatal.
///
/// # Errors
///
/// - [`BootstrapError::InvalidLogLevel`] if `log_level` is not recognised
/// - [`BootstrapError::AlreadyInitialised`] on a second call
/// - any pipeline error from [`Bootstrap::run`], after rollback
/// - [`BootstrapError::Subscriber`] if a global subscriber is already set
///
/// # Example
///
/// ```no_run
/// use telemetry_bootstrap::{ObservabilityConfig, BootstrapError};
///
/// # async fn run() -> Result<(), BootstrapError> {
/// let config = ObservabilityConfig::builder()
///     .log_level("debug")
///     .trace_enable(true)
///     .otlp_endpoint("collector:4317")
///     .build();
///
/// let guard = telemetry_bootstrap::init(&config, "orders", "shop")?;
/// tracing::info!("Application running");
/// guard.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub fn init(
    config: &ObservabilityConfig,
    service_name: &str,
    namespace: &str,
) -> Result<ObservabilityGuard, BootstrapError> {
    let level: LogLevel = config.log_level.parse()?;

    if INITIALISED.swap(true, Ordering::SeqCst) {
        return Err(BootstrapError::AlreadyInitialised);
    }

    let telemetry = match Bootstrap::otlp(config, service_name, namespace).run() {
        Ok(telemetry) => telemetry,
        Err(e) => {
            if init_subscriber(config.log_pretty, level, None, INSTRUMENTATION_SCOPE).is_ok() {
                tracing::error!(target: "otel_lifecycle", error = %e, "Observability setup failed");
            }
            return Err(e);
        }
    };

    init_subscriber(
        config.log_pretty,
        level,
        telemetry.tracer_provider(),
        INSTRUMENTATION_SCOPE,
    )?;

    tracing::info!(
        target: "otel_lifecycle",
        service = service_name,
        namespace,
        %level,
        tracing = telemetry.is_enabled(),
        "Observability initialised"
    );

    Ok(ObservabilityGuard { telemetry })
}

/// Guard that owns the installed providers.
///
/// Dropping it flushes and shuts down every provider, logging any failure
/// under the `otel_lifecycle` target.
#[derive(Debug)]
pub struct ObservabilityGuard {
    telemetry: OtlpTelemetry,
}

impl ObservabilityGuard {
    /// Returns the tracer provider if tracing is enabled.
    pub fn tracer_provider(&self) -> Option<&SdkTracerProvider> {
        self.telemetry.tracer_provider()
    }

    /// Returns the meter provider if tracing is enabled.
    pub fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.telemetry.meter_provider()
    }

    /// Flushes all configured providers without shutting them down.
    ///
    /// Flush errors are logged via `tracing::warn!` with target `otel_lifecycle`.
    pub fn flush(&self) {
        if let Some(provider) = self.telemetry.tracer_provider()
            && let Err(e) = provider.force_flush()
        {
            tracing::warn!(target: "otel_lifecycle", error = %e, "Failed to flush tracer provider");
        }

        if let Some(provider) = self.telemetry.meter_provider()
            && let Err(e) = provider.force_flush()
        {
            tracing::warn!(target: "otel_lifecycle", error = %e, "Failed to flush meter provider");
        }
    }

    /// Shuts down all providers in registration order.
    ///
    /// # Errors
    ///
    /// Returns every release failure as [`BootstrapError::ShutdownDrain`].
    pub fn shutdown(mut self) -> Result<(), BootstrapError> {
        self.telemetry.shutdown().map_err(BootstrapError::from)
    }
}
