//! Registry sink: where finished records are written.

pub mod consul;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::service::ServiceRecord;

pub use self::consul::ConsulAgent;

/// Write side of the service-discovery registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrySink: Send + Sync {
    /// Register records left to right, stopping at the first failure.
    async fn register(&self, records: &[ServiceRecord]) -> Result<(), RegistryError>;

    /// Deregister every record, then report all failures together.
    async fn deregister(&self, records: &[ServiceRecord]) -> Result<(), RegistryError>;
}
