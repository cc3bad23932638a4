//! Telemetry bootstrap workspace.
//!
//! This package only hosts workspace-level integration tests. The
//! functionality lives in the `telemetry-bootstrap` member crate, which
//! configures structured logging and the OTLP trace and metric pipeline
//! with rollback-safe shutdown.
