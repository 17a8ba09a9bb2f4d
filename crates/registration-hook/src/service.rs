//! Registration records handed to the registry.

use std::fmt;
use std::time::Duration;

/// Identity and name suffix of the TLS-fronted variant of an endpoint.
pub const SECURED_SUFFIX: &str = "-secured";

/// Health check type understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    HttpGet,
    Tcp,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpGet => write!(f, "HTTP_GET"),
            Self::Tcp => write!(f, "TCP"),
        }
    }
}

/// Registry-side health check, derived from a workload probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDescriptor {
    pub kind: CheckKind,
    /// `http://host:port/path` for HTTP checks, `host:port` for TCP.
    pub address: String,
    pub interval: Duration,
    pub timeout: Duration,
}

/// Unit of registration and deregistration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub check: Option<CheckDescriptor>,
    /// Kept in production order; the registry does not deduplicate.
    pub tags: Vec<String>,
}

impl ServiceRecord {
    /// Record that only carries an identity, used to retire an endpoint.
    pub fn deregistration(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn is_secured(&self) -> bool {
        is_secured_id(&self.id)
    }
}

/// `<host>_<port>`, with the secured suffix when requested.
pub fn service_id(host: &str, port: u16, secured: bool) -> String {
    if secured {
        format!("{host}_{port}{SECURED_SUFFIX}")
    } else {
        format!("{host}_{port}")
    }
}

pub fn is_secured_id(id: &str) -> bool {
    id.ends_with(SECURED_SUFFIX)
}

/// Service names mark the secured variant anywhere in the name.
pub fn is_secured_name(name: &str) -> bool {
    name.contains(SECURED_SUFFIX)
}
