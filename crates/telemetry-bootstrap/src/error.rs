//! Error types for the telemetry bootstrap.

use crate::logging::LevelParseError;
use crate::provider::{ProviderError, Signal};
use crate::registry::ShutdownErrors;
use crate::resource::ResourceError;
use thiserror::Error;

/// A specialised Result type for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Errors that can occur while bootstrapping or tearing down observability.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configured log level is not recognised.
    #[error("invalid log level")]
    InvalidLogLevel(#[from] LevelParseError),

    /// Resource attributes could not be assembled.
    #[error("failed to build resource descriptor")]
    ResourceDescriptor(#[from] ResourceError),

    /// A provider factory could not construct its export channel.
    #[error("failed to initialise {signal} provider")]
    TransportInit {
        /// Signal whose provider failed.
        signal: Signal,
        /// Underlying factory error.
        #[source]
        source: ProviderError,
    },

    /// A later stage failed and releasing the earlier stages failed as well.
    #[error("rollback failed: {rollback}")]
    RolledBack {
        /// The error that triggered the rollback.
        #[source]
        cause: Box<BootstrapError>,
        /// Failures reported while releasing already-initialised providers.
        rollback: ShutdownErrors,
    },

    /// One or more release actions failed during shutdown.
    #[error("shutdown failed")]
    ShutdownDrain(#[from] ShutdownErrors),

    /// The tracing subscriber could not be installed.
    #[error("failed to initialise tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    /// `run` was called on an orchestrator that already ran.
    #[error("bootstrap already started")]
    AlreadyStarted,

    /// Observability was already initialised in this process.
    #[error("observability already initialised in this process")]
    AlreadyInitialised,

    /// Configuration error.
    #[error("configuration error")]
    Config(#[source] Box<figment::Error>),
}

impl From<figment::Error> for BootstrapError {
    fn from(err: figment::Error) -> Self {
        BootstrapError::Config(Box::new(err))
    }
}

impl BootstrapError {
    /// The error that started the failure, looking through rollback wrapping.
    pub fn root_cause(&self) -> &BootstrapError {
        match self {
            BootstrapError::RolledBack { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Release failures collected while rolling back, if any.
    pub fn rollback_errors(&self) -> Option<&ShutdownErrors> {
        match self {
            BootstrapError::RolledBack { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}
