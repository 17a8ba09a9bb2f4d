//! Liveness Poller: hold registration until the workload actually serves.
//!
//! This is a local, active check run once before registration. It is
//! independent of the periodic check the registry runs afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::HookError;
use crate::poll::{PollOutcome, Poller};
use crate::source::WorkloadSource;
use crate::workload::Probe;

pub struct LivenessPoller {
    source: Arc<dyn WorkloadSource>,
    timeout: Duration,
}

impl LivenessPoller {
    pub fn new(source: Arc<dyn WorkloadSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Polls `probe` against `host` after its initial delay, every period,
    /// until one check passes or the health-check budget runs out.
    pub async fn wait_until_serving(
        &self,
        probe: &Probe,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<(), HookError> {
        let poller = Poller::new(probe.period, self.timeout).with_initial_delay(probe.initial_delay);
        info!(
            host = %host,
            initial_delay = ?probe.initial_delay,
            period = ?probe.period,
            timeout = ?self.timeout,
            "Waiting for workload to pass its health check"
        );

        let source = Arc::clone(&self.source);
        let probe_owned = probe.clone();
        let host_owned = host.to_string();
        let outcome = poller
            .run(cancel, move || {
                let source = Arc::clone(&source);
                let probe = probe_owned.clone();
                let host = host_owned.clone();
                async move {
                    match source.active_check(&probe, &host).await {
                        Ok(()) => Some(()),
                        Err(e) => {
                            debug!(host = %host, error = %e, "Health check not passing yet");
                            None
                        }
                    }
                }
            })
            .await;

        match outcome {
            PollOutcome::Succeeded(()) => {
                info!(host = %host, "Workload passed its health check");
                Ok(())
            }
            PollOutcome::TimedOut(_) => Err(HookError::LivenessTimeout(self.timeout)),
            PollOutcome::Cancelled => Err(HookError::Cancelled),
        }
    }
}
