//! Telemetry provider factories.
//!
//! A [`ProviderFactory`] turns a credential, an endpoint and a
//! [`ResourceDescriptor`] into one export-capable provider. Factories are
//! all-or-nothing: on failure nothing is left open, and they never install
//! anything process-wide. Installation is the orchestrator's job.
//!
//! [`OtlpTraceFactory`] and [`OtlpMetricFactory`] export over OTLP/gRPC and
//! authenticate with an `authorization: Basic <credential>` metadata entry.

use crate::registry::BoxError;
use crate::resource::ResourceDescriptor;
use crate::secret::SecretValue;
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider};
use std::fmt;
use std::time::Duration;
use tonic::metadata::{MetadataMap, MetadataValue};

const AUTHORIZATION: &str = "authorization";

/// Telemetry signal a provider exports.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Distributed traces.
    Traces,
    /// Metrics.
    Metrics,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Traces => f.write_str("traces"),
            Signal::Metrics => f.write_str("metrics"),
        }
    }
}

/// Errors raised while constructing a provider's export channel.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No endpoint was configured.
    #[error("export endpoint must not be empty")]
    EmptyEndpoint,

    /// A TLS endpoint was configured without a credential.
    #[error("endpoint {endpoint} requires a credential")]
    MissingCredential {
        /// The secured endpoint.
        endpoint: String,
    },

    /// The credential cannot be carried in a metadata header.
    #[error("credential is not a valid header value")]
    InvalidCredential(#[source] tonic::metadata::errors::InvalidMetadataValue),

    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    /// Any other transport construction failure.
    #[error("failed to initialise transport")]
    Transport(#[source] BoxError),
}

impl ProviderError {
    /// Wraps an arbitrary transport error.
    pub fn transport<E: Into<BoxError>>(error: E) -> Self {
        Self::Transport(error.into())
    }
}

/// A provider that can flush and close its transport.
pub trait Release: Clone + Send + Sync + 'static {
    /// Flushes pending data and shuts the provider down within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the flush or shutdown failure.
    fn release(&self, timeout: Duration) -> Result<(), BoxError>;
}

impl Release for SdkTracerProvider {
    fn release(&self, timeout: Duration) -> Result<(), BoxError> {
        self.shutdown_with_timeout(timeout).map_err(Into::into)
    }
}

impl Release for SdkMeterProvider {
    fn release(&self, timeout: Duration) -> Result<(), BoxError> {
        self.shutdown_with_timeout(timeout).map_err(Into::into)
    }
}

/// Builds one provider for one signal.
pub trait ProviderFactory {
    /// The provider handle produced on success.
    type Provider: Release;

    /// The signal this factory serves.
    fn signal(&self) -> Signal;

    /// Constructs the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the export channel cannot be constructed.
    fn build(
        &self,
        credential: &SecretValue,
        endpoint: &str,
        resource: &ResourceDescriptor,
    ) -> Result<Self::Provider, ProviderError>;
}

/// OTLP/gRPC trace provider factory with a batching span processor.
#[derive(Debug, Clone)]
pub struct OtlpTraceFactory {
    timeout: Duration,
    batch_timeout: Duration,
}

impl OtlpTraceFactory {
    /// Creates a factory.
    ///
    /// `timeout` bounds channel setup and each export; `batch_timeout` is
    /// the maximum delay before a batch of spans is exported.
    pub fn new(timeout: Duration, batch_timeout: Duration) -> Self {
        Self {
            timeout,
            batch_timeout,
        }
    }
}

impl ProviderFactory for OtlpTraceFactory {
    type Provider = SdkTracerProvider;

    fn signal(&self) -> Signal {
        Signal::Traces
    }

    fn build(
        &self,
        credential: &SecretValue,
        endpoint: &str,
        resource: &ResourceDescriptor,
    ) -> Result<SdkTracerProvider, ProviderError> {
        require_runtime()?;
        let endpoint = normalise_endpoint(endpoint)?;
        let metadata = auth_metadata(credential, &endpoint)?;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .with_timeout(self.timeout)
            .with_metadata(metadata)
            .build()?;

        let batch_config = BatchConfigBuilder::default()
            .with_scheduled_delay(self.batch_timeout)
            .build();

        let span_processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();

        Ok(SdkTracerProvider::builder()
            .with_span_processor(span_processor)
            .with_resource(resource.resource().clone())
            .build())
    }
}

/// OTLP/gRPC meter provider factory with a periodic reader.
#[derive(Debug, Clone)]
pub struct OtlpMetricFactory {
    timeout: Duration,
    interval: Duration,
}

impl OtlpMetricFactory {
    /// Creates a factory.
    ///
    /// `timeout` bounds channel setup and each export; `interval` is the
    /// period between metric collections.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl ProviderFactory for OtlpMetricFactory {
    type Provider = SdkMeterProvider;

    fn signal(&self) -> Signal {
        Signal::Metrics
    }

    fn build(
        &self,
        credential: &SecretValue,
        endpoint: &str,
        resource: &ResourceDescriptor,
    ) -> Result<SdkMeterProvider, ProviderError> {
        require_runtime()?;
        let endpoint = normalise_endpoint(endpoint)?;
        let metadata = auth_metadata(credential, &endpoint)?;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .with_timeout(self.timeout)
            .with_metadata(metadata)
            .build()?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(self.interval)
            .build();

        Ok(SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.resource().clone())
            .build())
    }
}

/// Tonic channels spawn onto the ambient Tokio runtime.
fn require_runtime() -> Result<(), ProviderError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(ProviderError::transport)
}

/// Bare `host:port` endpoints are treated as plaintext gRPC.
fn normalise_endpoint(endpoint: &str) -> Result<String, ProviderError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ProviderError::EmptyEndpoint);
    }

    if endpoint.contains("://") {
        Ok(endpoint.to_string())
    } else {
        Ok(format!("http://{endpoint}"))
    }
}

fn auth_metadata(credential: &SecretValue, endpoint: &str) -> Result<MetadataMap, ProviderError> {
    let mut metadata = MetadataMap::new();

    if credential.is_empty() {
        if endpoint.starts_with("https://") {
            return Err(ProviderError::MissingCredential {
                endpoint: endpoint.to_string(),
            });
        }
        return Ok(metadata);
    }

    let value = format!("Basic {}", credential.expose_secret())
        .parse::<MetadataValue<_>>()
        .map_err(ProviderError::InvalidCredential)?;
    metadata.insert(AUTHORIZATION, value);

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::build("provider-test", "tests", &HashMap::new()).unwrap()
    }

    #[test]
    fn test_normalise_bare_endpoint() {
        assert_eq!(
            normalise_endpoint("collector:4317").unwrap(),
            "http://collector:4317"
        );
        assert_eq!(
            normalise_endpoint("https://collector:4317").unwrap(),
            "https://collector:4317"
        );
    }

    #[test]
    fn test_normalise_empty_endpoint() {
        assert!(matches!(
            normalise_endpoint("   "),
            Err(ProviderError::EmptyEndpoint)
        ));
    }

    #[test]
    fn test_auth_metadata_sets_basic_header() {
        let metadata =
            auth_metadata(&SecretValue::new("dXNlcjpwYXNz"), "http://collector:4317").unwrap();

        assert_eq!(
            metadata.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Basic dXNlcjpwYXNz"
        );
    }

    #[test]
    fn test_auth_metadata_plaintext_without_credential() {
        let metadata = auth_metadata(&SecretValue::default(), "http://collector:4317").unwrap();

        assert!(metadata.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_auth_metadata_tls_requires_credential() {
        let err = auth_metadata(&SecretValue::default(), "https://collector:4317").unwrap_err();

        assert!(matches!(err, ProviderError::MissingCredential { .. }));
    }

    #[test]
    fn test_auth_metadata_rejects_control_characters() {
        let err =
            auth_metadata(&SecretValue::new("bad\nvalue"), "http://collector:4317").unwrap_err();

        assert!(matches!(err, ProviderError::InvalidCredential(_)));
    }

    #[test]
    fn test_error_does_not_leak_credential() {
        let err = auth_metadata(&SecretValue::new("s3cr3t\n"), "http://c:4317").unwrap_err();

        assert!(!format!("{err:?}").contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_trace_factory_invalid_endpoint() {
        let factory = OtlpTraceFactory::new(Duration::from_secs(1), Duration::from_secs(5));

        let result = factory.build(&SecretValue::new("pw"), "http://bad host:4317", &descriptor());

        assert!(matches!(result, Err(ProviderError::Exporter(_))));
    }

    #[tokio::test]
    async fn test_metric_factory_invalid_endpoint() {
        let factory = OtlpMetricFactory::new(Duration::from_secs(1), Duration::from_secs(5));

        let result = factory.build(&SecretValue::new("pw"), "http://bad host:4317", &descriptor());

        assert!(matches!(result, Err(ProviderError::Exporter(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trace_factory_builds_lazily() {
        let factory = OtlpTraceFactory::new(Duration::from_millis(200), Duration::from_secs(5));

        let provider = factory
            .build(&SecretValue::new("pw"), "127.0.0.1:4317", &descriptor())
            .unwrap();

        assert!(provider.release(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_trace_factory_outside_runtime() {
        let factory = OtlpTraceFactory::new(Duration::from_secs(1), Duration::from_secs(5));

        let result = factory.build(&SecretValue::new("pw"), "127.0.0.1:4317", &descriptor());

        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }

    #[test]
    fn test_metric_factory_outside_runtime() {
        let factory = OtlpMetricFactory::new(Duration::from_secs(1), Duration::from_secs(5));

        let result = factory.build(&SecretValue::new("pw"), "127.0.0.1:4317", &descriptor());

        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Traces.to_string(), "traces");
        assert_eq!(Signal::Metrics.to_string(), "metrics");
    }
}
