//! Resource descriptor assembly.
//!
//! A [`ResourceDescriptor`] is the set of identifying attributes attached to
//! every span and metric: service name and namespace plus host, OS and
//! container attributes detected from the running environment. It is built
//! once per process and cloned read-only into each provider.

use opentelemetry::{Key, KeyValue, Value};
use opentelemetry_sdk::resource::{Resource, ResourceDetector};
use opentelemetry_semantic_conventions::resource as semconv_res;
use std::collections::HashMap;
use std::env;

/// Re-export of the semantic convention keys this module emits.
pub mod semconv {
    pub use opentelemetry_semantic_conventions::resource::{
        CONTAINER_ID, HOST_ARCH, HOST_NAME, OS_TYPE, SERVICE_NAME, SERVICE_NAMESPACE,
    };
}

const HOSTNAME_ENV: &str = "HOSTNAME";
const HOSTNAME_FILE: &str = "/etc/hostname";
const CGROUP_FILE: &str = "/proc/self/cgroup";
const CONTAINER_ID_LEN: usize = 64;

/// Errors raised while assembling the resource descriptor.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// No service name was supplied.
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// A custom attribute had an empty key.
    #[error("resource attribute key must not be empty (value: {value:?})")]
    EmptyAttributeKey {
        /// Value that was supplied with the empty key.
        value: String,
    },
}

/// Identifying attributes shared by every telemetry provider.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    resource: Resource,
}

impl ResourceDescriptor {
    /// Assembles the descriptor from the service identity, custom attributes
    /// and the host, OS and container detectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the service name is empty or a custom attribute has
    /// an empty key.
    pub fn build(
        service_name: &str,
        namespace: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<Self, ResourceError> {
        if service_name.trim().is_empty() {
            return Err(ResourceError::EmptyServiceName);
        }

        let mut custom = Vec::with_capacity(attributes.len() + 1);
        for (key, value) in attributes {
            if key.trim().is_empty() {
                return Err(ResourceError::EmptyAttributeKey {
                    value: value.clone(),
                });
            }
            custom.push(KeyValue::new(key.clone(), value.clone()));
        }

        if !namespace.is_empty() {
            custom.push(KeyValue::new(
                semconv_res::SERVICE_NAMESPACE,
                namespace.to_string(),
            ));
        }

        let resource = Resource::builder()
            .with_detector(Box::new(HostDetector))
            .with_detector(Box::new(OsDetector))
            .with_detector(Box::new(ContainerDetector))
            .with_attributes(custom)
            .with_service_name(service_name.to_string())
            .build();

        Ok(Self { resource })
    }

    /// The underlying SDK resource.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Looks up a string attribute.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.resource.get(&Key::from(key.to_owned())) {
            Some(Value::String(s)) => Some(s.to_string()),
            _ => None,
        }
    }
}

/// Detects `host.name` and `host.arch`.
#[derive(Debug, Default)]
pub struct HostDetector;

impl ResourceDetector for HostDetector {
    fn detect(&self) -> Resource {
        let mut attributes = vec![KeyValue::new(semconv_res::HOST_ARCH, env::consts::ARCH)];

        if let Some(name) = detect_hostname() {
            attributes.push(KeyValue::new(semconv_res::HOST_NAME, name));
        }

        Resource::builder_empty().with_attributes(attributes).build()
    }
}

/// Detects `os.type`.
#[derive(Debug, Default)]
pub struct OsDetector;

impl ResourceDetector for OsDetector {
    fn detect(&self) -> Resource {
        Resource::builder_empty()
            .with_attribute(KeyValue::new(semconv_res::OS_TYPE, env::consts::OS))
            .build()
    }
}

/// Detects `container.id` from the cgroup file when running in a container.
#[derive(Debug, Default)]
pub struct ContainerDetector;

impl ResourceDetector for ContainerDetector {
    fn detect(&self) -> Resource {
        let id = std::fs::read_to_string(CGROUP_FILE)
            .ok()
            .and_then(|content| container_id_from_cgroup(&content));

        match id {
            Some(id) => Resource::builder_empty()
                .with_attribute(KeyValue::new(semconv_res::CONTAINER_ID, id))
                .build(),
            None => Resource::builder_empty().build(),
        }
    }
}

fn detect_hostname() -> Option<String> {
    if let Ok(name) = env::var(HOSTNAME_ENV)
        && !name.trim().is_empty()
    {
        return Some(name.trim().to_string());
    }

    std::fs::read_to_string(HOSTNAME_FILE)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts a 64-character hex container ID from cgroup file content.
///
/// Handles both plain (`/docker/<id>`) and systemd scope
/// (`/docker-<id>.scope`) path segments.
pub(crate) fn container_id_from_cgroup(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let path = line.rsplit(':').next()?;
        let segment = path.rsplit('/').next()?;
        let segment = segment.strip_suffix(".scope").unwrap_or(segment);
        let candidate = segment.rsplit('-').next()?;

        (candidate.len() == CONTAINER_ID_LEN && candidate.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| candidate.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ID: &str = "7be92808767a667f35c8505cbf40d14e931ef6db5b0210329cf193b15ba9d605";

    #[test]
    #[serial]
    fn test_build_sets_service_identity() {
        let descriptor = ResourceDescriptor::build("billing", "payments", &HashMap::new()).unwrap();

        assert_eq!(
            descriptor.get_str(semconv::SERVICE_NAME),
            Some("billing".to_string())
        );
        assert_eq!(
            descriptor.get_str(semconv::SERVICE_NAMESPACE),
            Some("payments".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_build_includes_host_and_os() {
        temp_env::with_var(HOSTNAME_ENV, Some("worker-7"), || {
            let descriptor = ResourceDescriptor::build("svc", "", &HashMap::new()).unwrap();

            assert_eq!(
                descriptor.get_str(semconv::HOST_NAME),
                Some("worker-7".to_string())
            );
            assert_eq!(
                descriptor.get_str(semconv::OS_TYPE),
                Some(env::consts::OS.to_string())
            );
            assert_eq!(
                descriptor.get_str(semconv::HOST_ARCH),
                Some(env::consts::ARCH.to_string())
            );
            assert_eq!(descriptor.get_str(semconv::SERVICE_NAMESPACE), None);
        });
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let err = ResourceDescriptor::build("  ", "ns", &HashMap::new()).unwrap_err();

        assert!(matches!(err, ResourceError::EmptyServiceName));
    }

    #[test]
    fn test_empty_attribute_key_rejected() {
        let attributes = HashMap::from([(String::new(), "orphan".to_string())]);

        let err = ResourceDescriptor::build("svc", "ns", &attributes).unwrap_err();

        assert!(matches!(err, ResourceError::EmptyAttributeKey { .. }));
    }

    #[test]
    fn test_custom_attributes_do_not_override_service_name() {
        let attributes = HashMap::from([
            ("service.name".to_string(), "spoofed".to_string()),
            ("deployment.environment.name".to_string(), "prod".to_string()),
        ]);

        let descriptor = ResourceDescriptor::build("real", "", &attributes).unwrap();

        assert_eq!(
            descriptor.get_str(semconv::SERVICE_NAME),
            Some("real".to_string())
        );
        assert_eq!(
            descriptor.get_str("deployment.environment.name"),
            Some("prod".to_string())
        );
    }

    #[test]
    fn test_container_id_docker_path() {
        let content = format!("12:memory:/docker/{ID}\n0::/\n");

        assert_eq!(container_id_from_cgroup(&content), Some(ID.to_string()));
    }

    #[test]
    fn test_container_id_systemd_scope() {
        let content = format!("0::/system.slice/docker-{ID}.scope\n");

        assert_eq!(container_id_from_cgroup(&content), Some(ID.to_string()));
    }

    #[test]
    fn test_container_id_absent_on_host() {
        let content = "0::/user.slice/user-1000.slice/session-2.scope\n";

        assert_eq!(container_id_from_cgroup(content), None);
    }
}
