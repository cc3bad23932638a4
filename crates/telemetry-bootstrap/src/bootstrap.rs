//! Rollback-safe telemetry pipeline orchestration.
//!
//! [`Bootstrap`] builds the resource descriptor, the trace provider and the
//! meter provider in sequence. Each provider's release action is registered
//! the moment it is created, so a failure in a later stage releases exactly
//! what already exists before the error is returned:
//!
//! ```text
//! Idle -> BuildingResources -> InstallingTrace -> InstallingMetric -> Ready
//!                                    \                   \
//!                                     +-> RollingBack -> Failed
//! ```
//!
//! Installing providers as process-wide defaults goes through an
//! [`Installer`], so tests can observe it and callers can opt out of global
//! state entirely.

use crate::config::ObservabilityConfig;
use crate::error::BootstrapError;
use crate::provider::{
    OtlpMetricFactory, OtlpTraceFactory, ProviderError, ProviderFactory, Release, Signal,
};
use crate::registry::{ReleaseAction, ShutdownErrors, ShutdownRegistry};
use crate::resource::ResourceDescriptor;
use crate::secret::SecretValue;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const TRACER_PROVIDER: &str = "tracer_provider";
const METER_PROVIDER: &str = "meter_provider";

/// Where the orchestrator is in its single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    /// Not started.
    Idle,
    /// Assembling resource attributes.
    BuildingResources,
    /// Building and installing the trace provider.
    InstallingTrace,
    /// Building and installing the meter provider.
    InstallingMetric,
    /// Finished successfully.
    Ready,
    /// Releasing providers created before a failure.
    RollingBack,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Idle => "idle",
            BootstrapStage::BuildingResources => "building_resources",
            BootstrapStage::InstallingTrace => "installing_trace",
            BootstrapStage::InstallingMetric => "installing_metric",
            BootstrapStage::Ready => "ready",
            BootstrapStage::RollingBack => "rolling_back",
            BootstrapStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Registration point for process-wide telemetry defaults.
pub trait Installer<T, M> {
    /// Makes `provider` the default tracer provider.
    fn install_tracer_provider(&mut self, provider: &T);

    /// Installs the trace-context + baggage text-map propagator.
    fn install_propagator(&mut self);

    /// Makes `provider` the default meter provider.
    fn install_meter_provider(&mut self, provider: &M);
}

/// Installs providers into `opentelemetry::global`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalInstaller;

impl Installer<SdkTracerProvider, SdkMeterProvider> for GlobalInstaller {
    fn install_tracer_provider(&mut self, provider: &SdkTracerProvider) {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }

    fn install_propagator(&mut self) {
        opentelemetry::global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]));
    }

    fn install_meter_provider(&mut self, provider: &SdkMeterProvider) {
        opentelemetry::global::set_meter_provider(provider.clone());
    }
}

/// Installs nothing; the caller threads the returned providers itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstaller;

impl<T, M> Installer<T, M> for NoopInstaller {
    fn install_tracer_provider(&mut self, _provider: &T) {}

    fn install_propagator(&mut self) {}

    fn install_meter_provider(&mut self, _provider: &M) {}
}

/// Composed teardown for every provider a bootstrap created.
///
/// Release actions run in registration order (tracer before meter).
/// Calling [`ShutdownHandle::shutdown`] more than once never releases a
/// provider twice. Pending actions are drained on drop and failures logged.
#[derive(Debug, Default)]
pub struct ShutdownHandle {
    registry: ShutdownRegistry,
}

impl ShutdownHandle {
    fn new(registry: ShutdownRegistry) -> Self {
        Self { registry }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Number of release actions still pending.
    pub fn pending(&self) -> usize {
        self.registry.len()
    }

    /// Releases every registered provider.
    ///
    /// # Errors
    ///
    /// Returns every release failure; all actions run regardless.
    pub fn shutdown(&mut self) -> Result<(), ShutdownErrors> {
        self.registry.drain_all()
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        if let Err(errors) = self.registry.drain_all() {
            tracing::error!(target: "otel_lifecycle", error = %errors, "Error shutting down telemetry providers");
        }
    }
}

/// Result of a successful bootstrap: provider handles plus their teardown.
///
/// Providers are `None` when tracing was disabled.
#[derive(Debug)]
pub struct Telemetry<T, M> {
    shutdown: ShutdownHandle,
    tracer_provider: Option<T>,
    meter_provider: Option<M>,
}

impl<T, M> Telemetry<T, M> {
    /// Telemetry with no providers and a no-op shutdown.
    pub fn disabled() -> Self {
        Self {
            shutdown: ShutdownHandle::noop(),
            tracer_provider: None,
            meter_provider: None,
        }
    }

    /// Returns `true` if providers were created.
    pub fn is_enabled(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Returns the tracer provider if configured.
    pub fn tracer_provider(&self) -> Option<&T> {
        self.tracer_provider.as_ref()
    }

    /// Returns the meter provider if configured.
    pub fn meter_provider(&self) -> Option<&M> {
        self.meter_provider.as_ref()
    }

    /// Releases every provider; see [`ShutdownHandle::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns every release failure.
    pub fn shutdown(&mut self) -> Result<(), ShutdownErrors> {
        self.shutdown.shutdown()
    }

    /// Splits off the teardown handle.
    pub fn into_parts(self) -> (Option<T>, Option<M>, ShutdownHandle) {
        (self.tracer_provider, self.meter_provider, self.shutdown)
    }
}

/// Telemetry produced by the OTLP factories.
pub type OtlpTelemetry = Telemetry<SdkTracerProvider, SdkMeterProvider>;

/// Single-pass orchestrator for the trace and metric pipeline.
pub struct Bootstrap<T, M, I> {
    trace_factory: T,
    metric_factory: M,
    installer: I,
    service_name: String,
    namespace: String,
    attributes: HashMap<String, String>,
    enabled: bool,
    credential: SecretValue,
    endpoint: String,
    shutdown_timeout: Duration,
    stage: BootstrapStage,
}

impl Bootstrap<OtlpTraceFactory, OtlpMetricFactory, GlobalInstaller> {
    /// Orchestrator using the OTLP/gRPC factories and global installation.
    pub fn otlp(
        config: &ObservabilityConfig,
        service_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let export = &config.export;
        Self::new(
            config,
            service_name,
            namespace,
            OtlpTraceFactory::new(export.timeout, export.trace_batch_timeout),
            OtlpMetricFactory::new(export.timeout, export.metric_interval),
            GlobalInstaller,
        )
    }
}

impl<T, M, I> Bootstrap<T, M, I>
where
    T: ProviderFactory,
    M: ProviderFactory,
    I: Installer<T::Provider, M::Provider>,
{
    /// Creates an orchestrator from configuration and explicit collaborators.
    pub fn new(
        config: &ObservabilityConfig,
        service_name: impl Into<String>,
        namespace: impl Into<String>,
        trace_factory: T,
        metric_factory: M,
        installer: I,
    ) -> Self {
        Self {
            trace_factory,
            metric_factory,
            installer,
            service_name: service_name.into(),
            namespace: namespace.into(),
            attributes: config.resource_attributes.clone(),
            enabled: config.trace_enable,
            credential: config.otlp_pass.clone(),
            endpoint: config.otlp_endpoint.clone(),
            shutdown_timeout: config.export.shutdown_timeout,
            stage: BootstrapStage::Idle,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    /// The installer, for inspecting what was registered.
    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// Runs the pipeline once.
    ///
    /// With tracing disabled no factory is invoked and the returned
    /// telemetry has a no-op shutdown.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::AlreadyStarted`] on a second call
    /// - [`BootstrapError::ResourceDescriptor`] if attributes are invalid
    /// - [`BootstrapError::TransportInit`] if a factory fails and every
    ///   already-created provider released cleanly
    /// - [`BootstrapError::RolledBack`] if a factory fails and releasing an
    ///   already-created provider also failed
    pub fn run(&mut self) -> Result<Telemetry<T::Provider, M::Provider>, BootstrapError> {
        if self.stage != BootstrapStage::Idle {
            return Err(BootstrapError::AlreadyStarted);
        }

        if !self.enabled {
            tracing::debug!(target: "otel_lifecycle", "Tracing disabled, skipping provider setup");
            self.transition(BootstrapStage::Ready);
            return Ok(Telemetry::disabled());
        }

        self.transition(BootstrapStage::BuildingResources);
        let resource =
            match ResourceDescriptor::build(&self.service_name, &self.namespace, &self.attributes)
            {
                Ok(resource) => resource,
                Err(e) => {
                    self.transition(BootstrapStage::Failed);
                    return Err(e.into());
                }
            };

        let mut registry = ShutdownRegistry::new();

        self.transition(BootstrapStage::InstallingTrace);
        let tracer_provider = match self
            .trace_factory
            .build(&self.credential, &self.endpoint, &resource)
        {
            Ok(provider) => provider,
            Err(source) => {
                let signal = self.trace_factory.signal();
                return Err(self.roll_back(&mut registry, signal, source));
            }
        };
        registry.register(release_action(
            TRACER_PROVIDER,
            &tracer_provider,
            self.shutdown_timeout,
        ));
        self.installer.install_tracer_provider(&tracer_provider);
        self.installer.install_propagator();

        self.transition(BootstrapStage::InstallingMetric);
        let meter_provider = match self
            .metric_factory
            .build(&self.credential, &self.endpoint, &resource)
        {
            Ok(provider) => provider,
            Err(source) => {
                let signal = self.metric_factory.signal();
                return Err(self.roll_back(&mut registry, signal, source));
            }
        };
        registry.register(release_action(
            METER_PROVIDER,
            &meter_provider,
            self.shutdown_timeout,
        ));
        self.installer.install_meter_provider(&meter_provider);

        self.transition(BootstrapStage::Ready);
        tracing::info!(
            target: "otel_lifecycle",
            endpoint = %self.endpoint,
            service = %self.service_name,
            "Telemetry providers installed"
        );

        Ok(Telemetry {
            shutdown: ShutdownHandle::new(registry),
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        })
    }

    fn roll_back(
        &mut self,
        registry: &mut ShutdownRegistry,
        signal: Signal,
        source: ProviderError,
    ) -> BootstrapError {
        tracing::warn!(
            target: "otel_lifecycle",
            %signal,
            error = %source,
            registered = registry.len(),
            "Provider setup failed, rolling back"
        );
        self.transition(BootstrapStage::RollingBack);

        let cause = BootstrapError::TransportInit { signal, source };
        let error = match registry.drain_all() {
            Ok(()) => cause,
            Err(rollback) => BootstrapError::RolledBack {
                cause: Box::new(cause),
                rollback,
            },
        };

        self.transition(BootstrapStage::Failed);
        error
    }

    fn transition(&mut self, next: BootstrapStage) {
        tracing::debug!(target: "otel_lifecycle", from = %self.stage, to = %next, "Bootstrap stage");
        self.stage = next;
    }
}

impl<T, M, I> fmt::Debug for Bootstrap<T, M, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("service_name", &self.service_name)
            .field("namespace", &self.namespace)
            .field("enabled", &self.enabled)
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

fn release_action<P: Release>(
    name: &'static str,
    provider: &P,
    timeout: Duration,
) -> ReleaseAction {
    let provider = provider.clone();
    ReleaseAction::new(name, move || provider.release(timeout))
}
