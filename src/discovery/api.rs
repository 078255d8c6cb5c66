//! API-based port discovery.
//!
//! Queries the Docker Engine API for all containers (including stopped ones)
//! and collects every port-mapping entry that carries a public host port.
//! Connection failures, non-2xx responses, and malformed payloads all surface
//! as a [`DiscoveryError::Api`] and leave the tunnel untouched.

use super::error::{DiscoveryError, DiscoveryResult};
use super::PortDiscovery;
use crate::ports::PortSet;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;
use tracing::debug;

/// Default timeout for Docker API requests, in seconds.
const API_TIMEOUT_SECS: u64 = 10;

/// Discovery provider backed by the Docker Engine API.
pub struct ApiDiscovery {
    docker: Docker,
    /// Ports unioned into every result regardless of what was listed.
    always_forward: PortSet,
}

impl ApiDiscovery {
    /// Connect to the Docker daemon.
    ///
    /// With `api_url` set (e.g. `tcp://192.168.59.103:2375`), connects over
    /// HTTP; otherwise uses the local platform defaults (Unix socket or the
    /// `DOCKER_HOST` environment variable).
    pub fn connect(api_url: Option<&str>) -> DiscoveryResult<Self> {
        let docker = match api_url {
            Some(url) => {
                Docker::connect_with_http(url, API_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self {
            docker,
            always_forward: PortSet::new(),
        })
    }

    /// Union the given ports into every discovery result.
    pub fn with_always_forward(mut self, ports: PortSet) -> Self {
        self.always_forward = ports;
        self
    }
}

impl PortDiscovery for ApiDiscovery {
    async fn discover(&self) -> DiscoveryResult<PortSet> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(DiscoveryError::from)?;

        let mut ports = collect_published(&containers);
        debug!(
            "Docker API listed {} container(s), {} published port(s)",
            containers.len(),
            ports.len()
        );
        ports.extend(self.always_forward.iter());
        Ok(ports)
    }
}

/// Collect every public host port from a container listing.
///
/// Entries without a public port (unpublished mappings) are skipped.
fn collect_published(containers: &[ContainerSummary]) -> PortSet {
    let mut ports = PortSet::new();
    for container in containers {
        let Some(mappings) = &container.ports else {
            continue;
        };
        for mapping in mappings {
            if let Some(public) = mapping.public_port {
                if let Ok(port) = u16::try_from(public) {
                    if port != 0 {
                        ports.insert(port);
                    }
                }
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::Port;

    fn container_with_ports(mappings: Vec<Port>) -> ContainerSummary {
        ContainerSummary {
            ports: Some(mappings),
            ..Default::default()
        }
    }

    fn mapping(private: u16, public: Option<u16>) -> Port {
        Port {
            private_port: private,
            public_port: public.map(|p| p as _),
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_published_ports() {
        let containers = vec![
            container_with_ports(vec![mapping(80, Some(49153)), mapping(443, None)]),
            container_with_ports(vec![mapping(5432, Some(5432))]),
        ];
        let ports = collect_published(&containers);
        let expected: PortSet = [49153, 5432].into_iter().collect();
        assert_eq!(ports, expected);
    }

    #[test]
    fn test_collect_skips_containers_without_mappings() {
        let containers = vec![ContainerSummary::default()];
        assert!(collect_published(&containers).is_empty());
    }

    #[test]
    fn test_collect_deduplicates_across_containers() {
        let containers = vec![
            container_with_ports(vec![mapping(80, Some(8080))]),
            container_with_ports(vec![mapping(8080, Some(8080))]),
        ];
        assert_eq!(collect_published(&containers).len(), 1);
    }
}
