//! Register and deregister flows.
//!
//! Registration is withheld whenever the records could be wrong: unresolved
//! address, no port, health gate not passed, or the pod already going away.
//! Deregistration attempts every record.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HookConfig;
use crate::error::HookError;
use crate::liveness::LivenessPoller;
use crate::provider::ServiceProvider;
use crate::registry::RegistrySink;
use crate::secured::orphaned_secured;
use crate::source::WorkloadSource;

/// What a register invocation ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Pod is not labelled for registration.
    NothingToRegister,
    /// Pod started terminating before registration.
    Terminating,
    /// Number of records written.
    Registered(usize),
}

pub struct RegistrationHook {
    provider: ServiceProvider,
    liveness: LivenessPoller,
    registry: Arc<dyn RegistrySink>,
}

impl RegistrationHook {
    pub fn new(
        source: Arc<dyn WorkloadSource>,
        registry: Arc<dyn RegistrySink>,
        config: HookConfig,
    ) -> Self {
        let liveness = LivenessPoller::new(Arc::clone(&source), config.health_check_timeout);
        Self {
            provider: ServiceProvider::new(source, config),
            liveness,
            registry,
        }
    }

    pub async fn register(&self, cancel: &CancellationToken) -> Result<RegisterOutcome, HookError> {
        let resolution = self.provider.get(cancel).await?;
        if resolution.records.is_empty() {
            return Ok(RegisterOutcome::NothingToRegister);
        }

        if let Some(probe) = &resolution.gate_probe {
            self.liveness
                .wait_until_serving(probe, &resolution.workload.address, cancel)
                .await?;
        }

        let config = self.provider.config();
        let terminating = until_cancelled(
            cancel,
            self.provider
                .resolver()
                .is_terminating(&config.pod_namespace, &config.pod_name),
        )
        .await?;
        if terminating {
            warn!(pod = %config.pod_name, "Pod is terminating, skipping registration");
            return Ok(RegisterOutcome::Terminating);
        }

        let orphaned = orphaned_secured(&resolution.records);
        if !orphaned.is_empty() {
            info!(count = orphaned.len(), "Deregistering orphaned secured services");
            // Orphan candidates are usually not registered at all, so failures
            // here are expected and never block registration.
            if let Err(e) = until_cancelled(cancel, self.registry.deregister(&orphaned)).await? {
                warn!(error = %e, "Failed to deregister orphaned secured services");
            }
        }

        until_cancelled(cancel, self.registry.register(&resolution.records)).await??;
        info!(count = resolution.records.len(), "Registration complete");
        Ok(RegisterOutcome::Registered(resolution.records.len()))
    }

    /// Deregisters every record of the pod; returns how many were attempted.
    pub async fn deregister(&self, cancel: &CancellationToken) -> Result<usize, HookError> {
        let resolution = self.provider.get(cancel).await?;
        if resolution.records.is_empty() {
            return Ok(0);
        }

        until_cancelled(cancel, self.registry.deregister(&resolution.records)).await??;
        info!(count = resolution.records.len(), "Deregistration complete");
        Ok(resolution.records.len())
    }
}

/// Runs `fut` unless `cancel` fires first; a fired token wins ties.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, HookError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HookError::Cancelled),
        value = fut => Ok(value),
    }
}
