//! Descriptor source: where workload snapshots and health answers come from.
//!
//! [`WorkloadSource`] is the seam between the resolution logic and the
//! cluster. [`KubeSource`] talks to the Kubernetes API and probes endpoints
//! directly; tests substitute their own implementation.

pub mod check;
pub mod kubernetes;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::workload::{Probe, WorkloadDescriptor};

pub use self::kubernetes::KubeSource;

/// Capability contract of the workload's source of truth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    /// Fetch the current snapshot of a workload.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<WorkloadDescriptor, SourceError>;

    /// Topology tags (`zone:..`, `region:..`) of the node running the workload.
    async fn failure_domain_tags(
        &self,
        workload: &WorkloadDescriptor,
    ) -> Result<Vec<String>, SourceError>;

    /// Run `probe` once against `host`.
    async fn active_check(&self, probe: &Probe, host: &str) -> Result<(), SourceError>;
}
