//! Records described entirely by command-line flags.
//!
//! Used where no orchestrator API is available: the caller passes the name,
//! address and port directly and gets a single record with an HTTP check.

use std::time::Duration;

use crate::probe::join_host_port;
use crate::service::{service_id, CheckDescriptor, CheckKind, ServiceRecord};

const TAGS_SEPARATOR: char = ',';
const CHECK_INTERVAL: Duration = Duration::from_secs(30);
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct FlagService {
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Comma-separated tags.
    pub tags: String,
    pub check_path: String,
}

impl FlagService {
    pub fn record(&self) -> ServiceRecord {
        ServiceRecord {
            id: service_id(&self.address, self.port, false),
            name: self.name.clone(),
            host: self.address.clone(),
            port: self.port,
            check: Some(CheckDescriptor {
                kind: CheckKind::HttpGet,
                address: format!(
                    "http://{}{}",
                    join_host_port(&self.address, self.port),
                    self.check_path
                ),
                interval: CHECK_INTERVAL,
                timeout: CHECK_TIMEOUT,
            }),
            tags: self
                .tags
                .split(TAGS_SEPARATOR)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_record_with_http_check() {
        let record = FlagService {
            name: "svc".to_string(),
            address: "192.0.2.2".to_string(),
            port: 8080,
            tags: "frontend, team:core,".to_string(),
            check_path: "/status/ping".to_string(),
        }
        .record();

        assert_eq!(record.id, "192.0.2.2_8080");
        assert_eq!(record.name, "svc");
        assert_eq!(record.tags, vec!["frontend", "team:core"]);
        let check = record.check.unwrap();
        assert_eq!(check.kind, CheckKind::HttpGet);
        assert_eq!(check.address, "http://192.0.2.2:8080/status/ping");
        assert_eq!(check.interval, CHECK_INTERVAL);
    }

    #[test]
    fn test_empty_tags() {
        let record = FlagService {
            name: "svc".to_string(),
            address: "192.0.2.2".to_string(),
            port: 8080,
            ..FlagService::default()
        }
        .record();

        assert!(record.tags.is_empty());
    }
}
