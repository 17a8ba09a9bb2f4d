//! Read-only snapshot of a running workload.
//!
//! A [`WorkloadDescriptor`] is built fresh from the Kubernetes `Pod` object on
//! every resolution attempt and dropped afterwards. Only the fields that drive
//! registration are kept: identity, address, declared container ports, probes,
//! labels, annotations, node placement and the deletion marker.

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Container as K8sContainer, ContainerPort as K8sContainerPort, Pod, Probe as K8sProbe,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

/// Kubernetes default for `periodSeconds`.
const DEFAULT_PERIOD: Duration = Duration::from_secs(10);
/// Kubernetes default for `timeoutSeconds`.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Snapshot of a single running unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub namespace: String,
    /// Pod IP; empty until the network is set up.
    pub address: String,
    pub containers: Vec<Container>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub node_name: Option<String>,
    /// Set once deletion of the workload has been requested.
    pub deletion_requested: bool,
}

impl WorkloadDescriptor {
    /// Whether the workload already has a routable address.
    pub fn has_address(&self) -> bool {
        !self.address.is_empty()
    }

    /// Label lookup.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A container with its declared ports and probes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub ports: Vec<ContainerPort>,
    pub liveness_probe: Option<Probe>,
    pub readiness_probe: Option<Probe>,
    pub startup_probe: Option<Probe>,
}

impl Container {
    /// Probe used to derive the registry check: readiness wins over liveness.
    pub fn check_probe(&self) -> Option<&Probe> {
        self.readiness_probe
            .as_ref()
            .or(self.liveness_probe.as_ref())
    }

    /// Probe used to gate registration locally: readiness wins over startup.
    pub fn gate_probe(&self) -> Option<&Probe> {
        self.readiness_probe
            .as_ref()
            .or(self.startup_probe.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPort {
    pub name: Option<String>,
    pub port: u16,
}

/// Health probe declared by a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// `None` for exec/gRPC probes or when a named port cannot be resolved.
    pub handler: Option<ProbeHandler>,
    pub initial_delay: Duration,
    pub period: Duration,
    pub timeout: Duration,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            handler: None,
            initial_delay: Duration::ZERO,
            period: DEFAULT_PERIOD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeHandler {
    HttpGet {
        path: String,
        port: u16,
        /// Declared scheme; kept for logging only, checks always use `http`.
        scheme: Option<String>,
    },
    TcpSocket {
        port: u16,
    },
}

impl From<&Pod> for WorkloadDescriptor {
    fn from(pod: &Pod) -> Self {
        let metadata = &pod.metadata;
        let spec = pod.spec.as_ref();

        Self {
            name: metadata.name.clone().unwrap_or_default(),
            namespace: metadata.namespace.clone().unwrap_or_default(),
            address: pod
                .status
                .as_ref()
                .and_then(|status| status.pod_ip.clone())
                .unwrap_or_default(),
            containers: spec
                .map(|spec| spec.containers.iter().map(Container::from).collect())
                .unwrap_or_default(),
            labels: metadata.labels.clone().unwrap_or_default(),
            annotations: metadata.annotations.clone().unwrap_or_default(),
            node_name: spec.and_then(|spec| spec.node_name.clone()),
            deletion_requested: metadata.deletion_timestamp.is_some(),
        }
    }
}

impl From<&K8sContainer> for Container {
    fn from(container: &K8sContainer) -> Self {
        let declared = container.ports.as_deref().unwrap_or_default();
        let probe = |probe: Option<&K8sProbe>| probe.map(|p| convert_probe(p, declared));

        Self {
            name: container.name.clone(),
            ports: declared.iter().filter_map(convert_port).collect(),
            liveness_probe: probe(container.liveness_probe.as_ref()),
            readiness_probe: probe(container.readiness_probe.as_ref()),
            startup_probe: probe(container.startup_probe.as_ref()),
        }
    }
}

fn convert_port(port: &K8sContainerPort) -> Option<ContainerPort> {
    let number = u16::try_from(port.container_port).ok()?;
    Some(ContainerPort {
        name: port.name.clone(),
        port: number,
    })
}

fn convert_probe(probe: &K8sProbe, declared: &[K8sContainerPort]) -> Probe {
    let handler = if let Some(action) = &probe.http_get {
        resolve_port(&action.port, declared).map(|port| ProbeHandler::HttpGet {
            path: action.path.clone().unwrap_or_default(),
            port,
            scheme: action.scheme.clone(),
        })
    } else if let Some(action) = &probe.tcp_socket {
        resolve_port(&action.port, declared).map(|port| ProbeHandler::TcpSocket { port })
    } else {
        None
    };

    let defaults = Probe::default();
    Probe {
        handler,
        initial_delay: seconds(probe.initial_delay_seconds).unwrap_or(defaults.initial_delay),
        period: seconds(probe.period_seconds).unwrap_or(defaults.period),
        timeout: seconds(probe.timeout_seconds).unwrap_or(defaults.timeout),
    }
}

/// Resolves a numeric or named probe port against the container's ports.
fn resolve_port(port: &IntOrString, declared: &[K8sContainerPort]) -> Option<u16> {
    match port {
        IntOrString::Int(number) => u16::try_from(*number).ok(),
        IntOrString::String(name) => {
            let resolved = declared
                .iter()
                .find(|p| p.name.as_deref() == Some(name.as_str()))
                .and_then(|p| u16::try_from(p.container_port).ok());
            if resolved.is_none() {
                debug!(port_name = %name, "Probe references an unknown named port");
            }
            resolved
        }
    }
}

fn seconds(value: Option<i32>) -> Option<Duration> {
    value
        .and_then(|v| u64::try_from(v).ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
}
