//! Configuration loading and management.
//!
//! Configuration is layered with figment (later sources override earlier):
//! 1. Default values (compiled in)
//! 2. Config file (optional TOML)
//! 3. `OTEL_EXPORTER_OTLP_ENDPOINT`
//! 4. Variables with the `TELEMETRY_` prefix, nested keys split on `__`
//!    (for example `TELEMETRY_EXPORT__TIMEOUT=2000`)
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `log_pretty` | `false` | Human-readable coloured log output instead of JSON |
//! | `log_level` | `"info"` | Minimum log severity |
//! | `trace_enable` | `false` | Build and install the OTLP trace and metric pipeline |
//! | `otlp_pass` | empty | Collector credential, masked when serialised |
//! | `otlp_endpoint` | `localhost:4317` | OTLP/gRPC collector address |

use crate::secret::SecretValue;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "TELEMETRY_";
const DEFAULT_ENDPOINT: &str = "localhost:4317";

/// Top-level observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Human-readable log output.
    pub log_pretty: bool,
    /// Minimum log level, parsed by [`LogLevel`](crate::LogLevel).
    pub log_level: String,
    /// Whether the trace and metric pipeline is built.
    pub trace_enable: bool,
    /// Collector credential.
    #[serde(skip_serializing_if = "SecretValue::is_empty")]
    pub otlp_pass: SecretValue,
    /// Collector address.
    pub otlp_endpoint: String,
    /// Export tunables.
    pub export: ExportConfig,
    /// Extra resource attributes attached to all telemetry.
    pub resource_attributes: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_pretty: false,
            log_level: "info".to_string(),
            trace_enable: false,
            otlp_pass: SecretValue::default(),
            otlp_endpoint: DEFAULT_ENDPOINT.to_string(),
            export: ExportConfig::default(),
            resource_attributes: HashMap::new(),
        }
    }
}

impl ObservabilityConfig {
    /// Loads configuration from defaults and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(None::<&Path>).extract()
    }

    /// Loads configuration, layering a TOML file under the environment.
    ///
    /// A missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, figment::Error> {
        Self::figment(Some(config_path)).extract()
    }

    fn figment<P: AsRef<Path>>(config_path: Option<P>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ObservabilityConfig::default()));

        if let Some(path) = config_path
            && path.as_ref().exists()
        {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(standard_otel_env());
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Creates a builder starting from default values.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Export pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Channel setup and per-export timeout in milliseconds.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Maximum delay before a span batch is exported, in milliseconds.
    #[serde(with = "duration_ms")]
    pub trace_batch_timeout: Duration,
    /// Interval between metric exports in milliseconds.
    #[serde(with = "duration_ms")]
    pub metric_interval: Duration,
    /// Upper bound for each provider's flush and shutdown, in milliseconds.
    #[serde(with = "duration_ms")]
    pub shutdown_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            trace_batch_timeout: Duration::from_secs(5),
            metric_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for constructing configuration programmatically.
#[must_use = "builders do nothing unless .build() is called"]
pub struct ConfigBuilder {
    config: ObservabilityConfig,
}

impl ConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ObservabilityConfig::default(),
        }
    }

    /// Enables pretty log output.
    pub fn log_pretty(mut self, pretty: bool) -> Self {
        self.config.log_pretty = pretty;
        self
    }

    /// Sets the log level string.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Enables or disables the trace and metric pipeline.
    pub fn trace_enable(mut self, enabled: bool) -> Self {
        self.config.trace_enable = enabled;
        self
    }

    /// Sets the collector credential.
    pub fn otlp_pass(mut self, pass: impl Into<SecretValue>) -> Self {
        self.config.otlp_pass = pass.into();
        self
    }

    /// Sets the collector endpoint.
    pub fn otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.otlp_endpoint = endpoint.into();
        self
    }

    /// Sets the export timeout.
    pub fn export_timeout(mut self, timeout: Duration) -> Self {
        self.config.export.timeout = timeout;
        self
    }

    /// Sets the span batch timeout.
    pub fn trace_batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.export.trace_batch_timeout = timeout;
        self
    }

    /// Sets the metric export interval.
    pub fn metric_interval(mut self, interval: Duration) -> Self {
        self.config.export.metric_interval = interval;
        self
    }

    /// Sets the per-provider shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.export.shutdown_timeout = timeout;
        self
    }

    /// Adds a resource attribute.
    pub fn resource_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .resource_attributes
            .insert(key.into(), value.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ObservabilityConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial config for standard OTEL env var overrides.
#[derive(Debug, Default, Serialize)]
struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    otlp_endpoint: Option<String>,
}

fn standard_otel_env() -> Serialized<PartialConfig> {
    let mut config = PartialConfig::default();

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        && !endpoint.trim().is_empty()
    {
        config.otlp_endpoint = Some(endpoint);
    }

    Serialized::defaults(config)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
