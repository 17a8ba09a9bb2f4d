//! Port-Mapping Resolver: which ports of a workload become services.
//!
//! Two strategies exist and exactly one applies per invocation:
//!
//! - [`PortStrategy::ContainerPorts`]: without port definitions, the first
//!   declared port of the selected container is registered.
//! - [`PortStrategy::PortDefinitions`]: with port definitions, every entry
//!   marked as a service (explicitly or by the default-port rule) is
//!   registered.

use tracing::debug;

use crate::error::HookError;
use crate::ports::{PortDefinition, PortDefinitions};
use crate::probe::to_check;
use crate::service::{is_secured_name, service_id, CheckDescriptor, ServiceRecord};
use crate::tags::TagComposer;
use crate::workload::{Container, WorkloadDescriptor};

/// Label carrying the base service name.
pub const SERVICE_NAME_LABEL: &str = "consul";
/// Label naming the container whose port is registered.
pub const CONTAINER_LABEL: &str = "consulContainer";

#[derive(Debug, Clone, Copy)]
pub enum PortStrategy<'a> {
    ContainerPorts,
    PortDefinitions(&'a PortDefinitions),
}

impl<'a> PortStrategy<'a> {
    pub fn select(definitions: Option<&'a PortDefinitions>) -> Self {
        match definitions {
            Some(definitions) => Self::PortDefinitions(definitions),
            None => Self::ContainerPorts,
        }
    }

    /// Container whose probes derive the checks and gate registration.
    pub fn probe_container<'w>(
        &self,
        workload: &'w WorkloadDescriptor,
    ) -> Result<Option<&'w Container>, HookError> {
        match self {
            Self::ContainerPorts => select_container(workload).map(Some),
            Self::PortDefinitions(_) => Ok(workload.containers.first()),
        }
    }

    /// Records for `workload` under the base `service_name`.
    pub fn records(
        &self,
        service_name: &str,
        workload: &WorkloadDescriptor,
        tags: &TagComposer,
    ) -> Result<Vec<ServiceRecord>, HookError> {
        let container = self.probe_container(workload)?;
        let host = workload.address.as_str();
        let check = container
            .and_then(Container::check_probe)
            .and_then(|probe| to_check(probe, host));

        match self {
            Self::ContainerPorts => {
                let port = container
                    .and_then(|c| c.ports.first())
                    .map(|p| p.port)
                    .ok_or(HookError::NoRegistrablePort)?;

                Ok(vec![ServiceRecord {
                    id: service_id(host, port, false),
                    name: service_name.to_string(),
                    host: host.to_string(),
                    port,
                    check,
                    tags: tags.compose(port, &[], false),
                }])
            }
            Self::PortDefinitions(definitions) => {
                let implicit_default = !definitions.has_service_port();
                let mut records = Vec::new();

                for (idx, definition) in definitions.iter().enumerate() {
                    let explicit_name = definition.consul_name();
                    let registrable = explicit_name.is_some()
                        || definition.is_service()
                        || (idx == 0 && implicit_default);

                    if !registrable {
                        debug!(
                            port = definition.port,
                            probe = definition.is_probe(),
                            "Skipping port definition"
                        );
                        continue;
                    }

                    let name = explicit_name.unwrap_or(service_name);
                    records.push(definition_record(
                        definition,
                        name,
                        host,
                        check.clone(),
                        tags,
                    ));
                }

                Ok(records)
            }
        }
    }
}

fn definition_record(
    definition: &PortDefinition,
    name: &str,
    host: &str,
    check: Option<CheckDescriptor>,
    tags: &TagComposer,
) -> ServiceRecord {
    let secured = is_secured_name(name);
    ServiceRecord {
        id: service_id(host, definition.port, secured),
        name: name.to_string(),
        host: host.to_string(),
        port: definition.port,
        check,
        tags: tags.compose(definition.port, &definition.tags(), secured),
    }
}

/// Container named by the `consulContainer` label, else the first one with
/// a declared port.
fn select_container(workload: &WorkloadDescriptor) -> Result<&Container, HookError> {
    let wanted = workload.label(CONTAINER_LABEL);

    workload
        .containers
        .iter()
        .filter(|container| !container.ports.is_empty())
        .find(|container| wanted.map_or(true, |name| container.name == name))
        .ok_or(HookError::NoRegistrablePort)
}
