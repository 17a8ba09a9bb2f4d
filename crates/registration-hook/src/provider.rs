//! Service provider: turns the hook's own pod into registration records.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::HookConfig;
use crate::error::HookError;
use crate::mapping::{PortStrategy, SERVICE_NAME_LABEL};
use crate::resolver::WorkloadResolver;
use crate::service::ServiceRecord;
use crate::source::WorkloadSource;
use crate::tags::{annotation_tags, failure_domain_tags, identity_tags, TagComposer};
use crate::workload::{Probe, WorkloadDescriptor};

/// Records computed for one workload.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub workload: WorkloadDescriptor,
    pub records: Vec<ServiceRecord>,
    /// Probe that must pass locally before registering.
    pub gate_probe: Option<Probe>,
}

pub struct ServiceProvider {
    source: Arc<dyn WorkloadSource>,
    resolver: WorkloadResolver,
    config: HookConfig,
}

impl ServiceProvider {
    pub fn new(source: Arc<dyn WorkloadSource>, config: HookConfig) -> Self {
        let resolver = WorkloadResolver::new(Arc::clone(&source), config.pod_timeout);
        Self {
            source,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn resolver(&self) -> &WorkloadResolver {
        &self.resolver
    }

    /// Resolves the pod and computes its records.
    ///
    /// A pod without the `consul` label yields an empty resolution.
    #[instrument(skip_all, fields(namespace = %self.config.pod_namespace, pod = %self.config.pod_name))]
    pub async fn get(&self, cancel: &CancellationToken) -> Result<Resolution, HookError> {
        let workload = self
            .resolver
            .resolve(&self.config.pod_namespace, &self.config.pod_name, cancel)
            .await?;

        let Some(service_name) = workload.label(SERVICE_NAME_LABEL).map(str::to_string) else {
            info!("Pod has no '{SERVICE_NAME_LABEL}' label, nothing to register");
            return Ok(Resolution {
                workload,
                ..Resolution::default()
            });
        };

        let tags = TagComposer::new(workload.name.clone())
            .with_global_tags(identity_tags(
                &self.config.pod_name,
                &self.config.pod_namespace,
            ))
            .with_global_tags(
                failure_domain_tags(self.source.as_ref(), &workload)
                    .await
                    .unwrap_or_default(),
            )
            .with_global_tags(annotation_tags(&workload))
            .with_service_port(self.config.service_port)
            .with_lb_tag_prefix(self.config.lb_tag_prefix.clone());

        let strategy = PortStrategy::select(self.config.port_definitions.as_ref());
        let records = strategy.records(&service_name, &workload, &tags)?;
        let gate_probe = strategy
            .probe_container(&workload)?
            .and_then(|container| container.gate_probe())
            .filter(|probe| {
                // exec, gRPC and unresolved named ports cannot be checked locally
                let checkable = probe.handler.is_some();
                if !checkable {
                    debug!("Gate probe has no HTTP or TCP handler, skipping health gate");
                }
                checkable
            })
            .cloned();

        info!(
            service = %service_name,
            count = records.len(),
            "Computed services for registration"
        );
        Ok(Resolution {
            workload,
            records,
            gate_probe,
        })
    }
}
