//! Error types for workload resolution and registry writes.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`WorkloadSource`](crate::source::WorkloadSource).
///
/// Returned from a poll attempt these are transient: the loop logs them and
/// tries again on the next tick.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Kubernetes API call failed.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Workload is not scheduled on a node yet.
    #[error("pod {0} has no node assigned")]
    MissingNodeName(String),

    /// Node carries no topology labels.
    #[error("failure domain labels don't exist on node {0}")]
    NoFailureDomain(String),

    /// Probe has neither an HTTP nor a TCP handler.
    #[error("probe has no supported handler")]
    UnsupportedProbe,

    /// HTTP check could not be performed.
    #[error("HTTP check failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP check got an answer outside the success range.
    #[error("HTTP check to {address} returned status {status}")]
    UnhealthyStatus { address: String, status: u16 },

    /// TCP check could not connect.
    #[error("TCP check failed: {0}")]
    Tcp(#[from] std::io::Error),

    /// Single check attempt exceeded the probe timeout.
    #[error("check to {address} timed out after {timeout:?}")]
    CheckTimeout { address: String, timeout: Duration },
}

/// A single failed deregistration inside a [`RegistryError::PartialDeregister`].
#[derive(Debug)]
pub struct DeregisterFailure {
    pub service_id: String,
    pub error: RegistryError,
}

/// Errors raised by a [`RegistrySink`](crate::registry::RegistrySink).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with a non-success status.
    #[error("Consul API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// One or more deregistrations failed; every record was still attempted.
    #[error("failed to deregister {} service(s): {}", .failures.len(), FailureList(.failures))]
    PartialDeregister { failures: Vec<DeregisterFailure> },
}

struct FailureList<'a>(&'a [DeregisterFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.service_id, failure.error)?;
        }
        Ok(())
    }
}

/// Errors that abort a hook invocation.
#[derive(Debug, Error)]
pub enum HookError {
    /// Workload never got an address within the resolver budget.
    #[error("could not get valid pod data after {0:?}")]
    ResolutionTimeout(Duration),

    /// No container or port definition yields a usable port.
    #[error("unable to register, cannot find containerPort")]
    NoRegistrablePort,

    /// Local health poll never succeeded within the health-check budget.
    #[error("endpoint did not pass its health check within {0:?}")]
    LivenessTimeout(Duration),

    /// Port definitions could not be parsed.
    #[error("unable to parse port definitions: {0}")]
    InvalidPortDefinitions(#[from] serde_json::Error),

    /// Descriptor source failed outside a retrying loop.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Registry write failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The invocation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_deregister_lists_every_failure() {
        let err = RegistryError::PartialDeregister {
            failures: vec![
                DeregisterFailure {
                    service_id: "10.0.0.1_8080".to_string(),
                    error: RegistryError::Api {
                        status: 500,
                        message: "boom".to_string(),
                    },
                },
                DeregisterFailure {
                    service_id: "10.0.0.1_8080-secured".to_string(),
                    error: RegistryError::Api {
                        status: 404,
                        message: "unknown service".to_string(),
                    },
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("failed to deregister 2 service(s)"));
        assert!(message.contains("10.0.0.1_8080: Consul API error: 500 - boom"));
        assert!(message.contains("10.0.0.1_8080-secured: Consul API error: 404"));
    }

    #[test]
    fn test_resolution_timeout_reports_budget() {
        let err = HookError::ResolutionTimeout(Duration::from_secs(1));
        assert_eq!(err.to_string(), "could not get valid pod data after 1s");
    }
}
