//! OTLP factories driven through the orchestrator without touching globals.

use std::time::Duration;
use telemetry_bootstrap::{
    Bootstrap, BootstrapError, BootstrapStage, NoopInstaller, ObservabilityConfig,
    OtlpMetricFactory, OtlpTraceFactory, ProviderError, ProviderFactory, ResourceDescriptor,
    SecretValue, Signal,
};

/// Delegates to an inner factory but always dials a fixed endpoint.
struct FixedEndpoint<F> {
    inner: F,
    endpoint: &'static str,
}

impl<F: ProviderFactory> ProviderFactory for FixedEndpoint<F> {
    type Provider = F::Provider;

    fn signal(&self) -> Signal {
        self.inner.signal()
    }

    fn build(
        &self,
        credential: &SecretValue,
        _endpoint: &str,
        resource: &ResourceDescriptor,
    ) -> Result<Self::Provider, ProviderError> {
        self.inner.build(credential, self.endpoint, resource)
    }
}

fn config() -> ObservabilityConfig {
    ObservabilityConfig::builder()
        .trace_enable(true)
        .otlp_endpoint("127.0.0.1:4317")
        .shutdown_timeout(Duration::from_secs(1))
        .build()
}

fn trace_factory() -> OtlpTraceFactory {
    OtlpTraceFactory::new(Duration::from_secs(1), Duration::from_secs(5))
}

fn metric_factory() -> OtlpMetricFactory {
    OtlpMetricFactory::new(Duration::from_secs(1), Duration::from_secs(60))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_builds_both_providers_lazily() {
    let mut bootstrap = Bootstrap::new(
        &config(),
        "orders",
        "shop",
        trace_factory(),
        metric_factory(),
        NoopInstaller,
    );

    let telemetry = bootstrap.run().unwrap();

    assert_eq!(bootstrap.stage(), BootstrapStage::Ready);
    assert!(telemetry.is_enabled());
    assert!(telemetry.meter_provider().is_some());

    let (_, _, mut handle) = telemetry.into_parts();
    assert_eq!(handle.pending(), 2);

    let _ = handle.shutdown();
    assert_eq!(handle.pending(), 0);
    assert!(handle.shutdown().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_metric_failure_rolls_back_trace_provider() {
    let metric = FixedEndpoint {
        inner: metric_factory(),
        endpoint: "https://collector.example.com:4317",
    };
    let mut bootstrap = Bootstrap::new(
        &config(),
        "orders",
        "shop",
        trace_factory(),
        metric,
        NoopInstaller,
    );

    let err = bootstrap.run().unwrap_err();

    assert_eq!(bootstrap.stage(), BootstrapStage::Failed);
    assert!(matches!(
        err.root_cause(),
        BootstrapError::TransportInit {
            signal: Signal::Metrics,
            source: ProviderError::MissingCredential { .. },
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trace_failure_builds_nothing_else() {
    let trace = FixedEndpoint {
        inner: trace_factory(),
        endpoint: "",
    };
    let mut bootstrap = Bootstrap::new(
        &config(),
        "orders",
        "shop",
        trace,
        metric_factory(),
        NoopInstaller,
    );

    let err = bootstrap.run().unwrap_err();

    assert!(err.rollback_errors().is_none());
    assert!(matches!(
        err,
        BootstrapError::TransportInit {
            signal: Signal::Traces,
            source: ProviderError::EmptyEndpoint,
        }
    ));
}
