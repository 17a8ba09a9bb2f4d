//! Hook configuration, injected at construction time.
//!
//! The binary fills this from flags and environment variables; the library
//! itself never reads the process environment.

use std::time::Duration;

use crate::error::HookError;
use crate::ports::PortDefinitions;

/// Default Workload Resolver budget.
pub const DEFAULT_POD_TIMEOUT: Duration = Duration::from_secs(60);
/// Default Liveness Poller budget.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(120);
/// Default prefix of load-balancer tags.
pub const DEFAULT_LB_TAG_PREFIX: &str = "lb-";

#[derive(Debug, Clone)]
pub struct HookConfig {
    pub pod_namespace: String,
    pub pod_name: String,
    /// Budget for the pod to get an address.
    pub pod_timeout: Duration,
    /// Budget for the local health gate.
    pub health_check_timeout: Duration,
    /// Declarative port definitions; `None` selects container ports.
    pub port_definitions: Option<PortDefinitions>,
    /// Service-port override advertised as `service-port:<port>`.
    pub service_port: Option<u16>,
    /// Tags with this prefix are never attached to secured records.
    pub lb_tag_prefix: String,
}

impl HookConfig {
    pub fn new(pod_namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            pod_namespace: pod_namespace.into(),
            pod_name: pod_name.into(),
            pod_timeout: DEFAULT_POD_TIMEOUT,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
            port_definitions: None,
            service_port: None,
            lb_tag_prefix: DEFAULT_LB_TAG_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_pod_timeout(mut self, timeout: Duration) -> Self {
        self.pod_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_port_definitions(mut self, definitions: Option<PortDefinitions>) -> Self {
        self.port_definitions = definitions;
        self
    }

    /// Parses raw JSON port definitions; blank input means none.
    pub fn with_raw_port_definitions(self, raw: Option<&str>) -> Result<Self, HookError> {
        let definitions = match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(PortDefinitions::parse(raw)?),
            None => None,
        };
        Ok(self.with_port_definitions(definitions))
    }

    #[must_use]
    pub fn with_service_port(mut self, port: Option<u16>) -> Self {
        self.service_port = port;
        self
    }

    #[must_use]
    pub fn with_lb_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lb_tag_prefix = prefix.into();
        self
    }
}
