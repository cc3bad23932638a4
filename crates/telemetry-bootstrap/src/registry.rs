//! Ordered release actions with aggregated errors.
//!
//! The [`ShutdownRegistry`] accumulates one [`ReleaseAction`] per successfully
//! initialised resource. [`ShutdownRegistry::drain_all`] runs every action in
//! registration order, keeps going past failures, and reports all of them at
//! once as [`ShutdownErrors`].

use std::fmt;

/// Boxed error returned by a single release action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A named capability to tear down exactly one resource.
pub struct ReleaseAction {
    name: &'static str,
    action: Box<dyn FnOnce() -> Result<(), BoxError> + Send>,
}

impl ReleaseAction {
    /// Creates a release action.
    ///
    /// `name` identifies the resource in error reports and lifecycle logs.
    pub fn new<F, E>(name: &'static str, action: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            name,
            action: Box::new(move || action().map_err(Into::into)),
        }
    }

    /// Name of the guarded resource.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn run(self) -> Result<(), ReleaseError> {
        (self.action)().map_err(|source| ReleaseError {
            resource: self.name,
            source,
        })
    }
}

impl fmt::Debug for ReleaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Failure of a single release action.
#[derive(Debug, thiserror::Error)]
#[error("failed to release {resource}")]
pub struct ReleaseError {
    resource: &'static str,
    #[source]
    source: BoxError,
}

impl ReleaseError {
    /// Name of the resource that failed to release.
    pub fn resource(&self) -> &'static str {
        self.resource
    }
}

/// Every failure collected during one drain, in registration order.
#[derive(Debug, Default)]
pub struct ShutdownErrors {
    errors: Vec<ReleaseError>,
}

impl ShutdownErrors {
    /// Returns `true` if no release action failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed release actions.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates over the individual failures.
    pub fn iter(&self) -> impl Iterator<Item = &ReleaseError> {
        self.errors.iter()
    }

    /// Names of the resources that failed to release.
    pub fn resources(&self) -> Vec<&'static str> {
        self.errors.iter().map(ReleaseError::resource).collect()
    }

    fn push(&mut self, error: ReleaseError) {
        self.errors.push(error);
    }

    fn into_result(self) -> Result<(), ShutdownErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ShutdownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} release action(s) failed", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {error}: {}", error.source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl IntoIterator for ShutdownErrors {
    type Item = ReleaseError;
    type IntoIter = std::vec::IntoIter<ReleaseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Ordered collection of release actions.
#[derive(Debug, Default)]
pub struct ShutdownRegistry {
    actions: Vec<ReleaseAction>,
}

impl ShutdownRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a release action.
    pub fn register(&mut self, action: ReleaseAction) {
        tracing::debug!(target: "otel_lifecycle", resource = action.name(), "Registered release action");
        self.actions.push(action);
    }

    /// Number of actions waiting to run.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every registered action in registration order.
    ///
    /// All actions run even if earlier ones fail. The registry is empty
    /// afterwards, so a second call is a no-op returning `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns every individual failure when at least one action failed.
    pub fn drain_all(&mut self) -> Result<(), ShutdownErrors> {
        let mut errors = ShutdownErrors::default();

        for action in std::mem::take(&mut self.actions) {
            let resource = action.name();
            match action.run() {
                Ok(()) => {
                    tracing::debug!(target: "otel_lifecycle", resource, "Released");
                }
                Err(e) => {
                    tracing::warn!(target: "otel_lifecycle", resource, error = %e.source, "Release failed");
                    errors.push(e);
                }
            }
        }

        errors.into_result()
    }
}
