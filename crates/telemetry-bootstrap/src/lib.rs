//! Logger and OpenTelemetry pipeline bootstrap with rollback-safe shutdown.
//!
//! This crate configures a structured `tracing` logger and, optionally, an
//! OTLP/gRPC trace and metric export pipeline. Setup is a single sequential
//! pass; every provider's release action is registered as soon as the
//! provider exists, so a failure part-way through releases exactly what was
//! created and reports both the original failure and any release failures.
//!
//! # Features
//!
//! - **Layered configuration** - Defaults, an optional TOML file and
//!   environment variables, merged with [figment](https://docs.rs/figment)
//! - **Masked credentials** - [`SecretValue`] never serialises its content
//! - **Rollback on partial failure** - see [`Bootstrap`]
//! - **Aggregated shutdown errors** - [`ShutdownRegistry`] runs every release
//!   action and returns all failures as [`ShutdownErrors`]
//! - **Explicit installation** - process-wide defaults go through an
//!   [`Installer`], replaceable in tests
//!
//! # Example
//!
//! ```no_run
//! use telemetry_bootstrap::{BootstrapError, ObservabilityConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BootstrapError> {
//!     let config = ObservabilityConfig::load()?;
//!     let guard = telemetry_bootstrap::init(&config, "orders", "shop")?;
//!
//!     tracing::info!("Application running");
//!
//!     // Flushes and shuts down the tracer provider, then the meter provider
//!     guard.shutdown()
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bootstrap;
pub mod claims;
mod config;
mod error;
mod guard;
mod logging;
mod provider;
mod registry;
pub mod resource;
mod secret;

pub use bootstrap::{
    Bootstrap, BootstrapStage, GlobalInstaller, Installer, NoopInstaller, OtlpTelemetry,
    ShutdownHandle, Telemetry,
};
pub use claims::{Claims, ClaimsError, RegisteredClaims};
pub use config::{ConfigBuilder, ExportConfig, ObservabilityConfig};
pub use error::{BootstrapError, Result};
pub use guard::{ObservabilityGuard, init};
pub use logging::{LevelParseError, LogLevel};
pub use provider::{
    OtlpMetricFactory, OtlpTraceFactory, ProviderError, ProviderFactory, Release, Signal,
};
pub use registry::{BoxError, ReleaseAction, ReleaseError, ShutdownErrors, ShutdownRegistry};
pub use resource::{ResourceDescriptor, ResourceError};
pub use secret::SecretValue;

// Re-export figment for callers layering their own configuration sources
pub use figment;
