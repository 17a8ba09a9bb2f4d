//! Workload Resolver.
//!
//! Pod data becomes usable only once the pod has an IP, which may lag the
//! hook start by several seconds. The resolver polls the source until the
//! address is set or the budget is exhausted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::HookError;
use crate::poll::{PollOutcome, Poller};
use crate::source::WorkloadSource;
use crate::workload::WorkloadDescriptor;

/// Wait between two fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct WorkloadResolver {
    source: Arc<dyn WorkloadSource>,
    poller: Poller,
}

impl WorkloadResolver {
    pub fn new(source: Arc<dyn WorkloadSource>, timeout: Duration) -> Self {
        Self {
            source,
            poller: Poller::new(POLL_INTERVAL, timeout),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poller.interval = interval;
        self
    }

    /// First snapshot of `namespace/name` that carries an address.
    pub async fn resolve(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkloadDescriptor, HookError> {
        let source = Arc::clone(&self.source);
        let namespace_owned = namespace.to_string();
        let name_owned = name.to_string();

        let outcome = self
            .poller
            .run(cancel, move || {
                let source = Arc::clone(&source);
                let namespace = namespace_owned.clone();
                let name = name_owned.clone();
                async move {
                    match source.fetch(&namespace, &name).await {
                        Ok(workload) if workload.has_address() => Some(workload),
                        Ok(_) => {
                            debug!(namespace = %namespace, pod = %name, "Pod has no IP yet");
                            None
                        }
                        Err(e) => {
                            warn!(
                                namespace = %namespace,
                                pod = %name,
                                error = %e,
                                "unable to get pod data from API"
                            );
                            None
                        }
                    }
                }
            })
            .await;

        match outcome {
            PollOutcome::Succeeded(workload) => {
                info!(
                    namespace = %namespace,
                    pod = %name,
                    address = %workload.address,
                    "Resolved pod data"
                );
                Ok(workload)
            }
            PollOutcome::TimedOut(elapsed) => Err(HookError::ResolutionTimeout(elapsed)),
            PollOutcome::Cancelled => Err(HookError::Cancelled),
        }
    }

    /// Single fetch reporting whether the workload is going away.
    ///
    /// Fetch errors count as terminating so a workload that may already be
    /// gone is never registered.
    pub async fn is_terminating(&self, namespace: &str, name: &str) -> bool {
        match self.source.fetch(namespace, name).await {
            Ok(workload) => workload.deletion_requested,
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    pod = %name,
                    error = %e,
                    "Unable to check pod termination, assuming it is terminating"
                );
                true
            }
        }
    }
}
