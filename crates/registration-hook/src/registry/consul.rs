//! Consul agent client.
//!
//! Only the two agent endpoints the hook needs are covered:
//! `PUT /v1/agent/service/register` and
//! `PUT /v1/agent/service/deregister/{id}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::RegistrySink;
use crate::error::{DeregisterFailure, RegistryError};
use crate::service::{CheckDescriptor, CheckKind, ServiceRecord};

/// Local agent address used when none is configured.
pub const DEFAULT_CONSUL_ADDRESS: &str = "http://127.0.0.1:8500";
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    tags: &'a [String],
    address: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<AgentServiceCheck>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck {
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    http: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'static str>,
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    tcp: Option<String>,
    interval: String,
    timeout: String,
}

impl From<&CheckDescriptor> for AgentServiceCheck {
    fn from(check: &CheckDescriptor) -> Self {
        let (http, method, tcp) = match check.kind {
            CheckKind::HttpGet => (Some(check.address.clone()), Some("GET"), None),
            CheckKind::Tcp => (None, None, Some(check.address.clone())),
        };
        Self {
            http,
            method,
            tcp,
            interval: go_duration(check.interval),
            timeout: go_duration(check.timeout),
        }
    }
}

/// Duration in the `"10s"` form the agent parses.
fn go_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Registers and deregisters services through the local Consul agent.
#[derive(Clone)]
pub struct ConsulAgent {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl ConsulAgent {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, RegistryError> {
        let http = HttpClient::builder()
            .user_agent("consul-registration-hook")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn put(&self, path: &str, body: Option<&AgentServiceRegistration<'_>>) -> Result<(), RegistryError> {
        let mut request = self.http.put(format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        check_response(request.send().await?).await
    }

    async fn register_one(&self, record: &ServiceRecord) -> Result<(), RegistryError> {
        let registration = AgentServiceRegistration {
            id: &record.id,
            name: &record.name,
            tags: &record.tags,
            address: &record.host,
            port: record.port,
            check: record.check.as_ref().map(AgentServiceCheck::from),
        };
        debug!(service_id = %record.id, "Registering service in Consul");
        self.put("/v1/agent/service/register", Some(&registration))
            .await
    }

    async fn deregister_one(&self, service_id: &str) -> Result<(), RegistryError> {
        debug!(service_id = %service_id, "Deregistering service from Consul");
        self.put(&format!("/v1/agent/service/deregister/{service_id}"), None)
            .await
    }
}

async fn check_response(response: Response) -> Result<(), RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(RegistryError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

#[async_trait]
impl RegistrySink for ConsulAgent {
    async fn register(&self, records: &[ServiceRecord]) -> Result<(), RegistryError> {
        for record in records {
            self.register_one(record).await?;
            info!(service_id = %record.id, service = %record.name, "Service registered");
        }
        Ok(())
    }

    async fn deregister(&self, records: &[ServiceRecord]) -> Result<(), RegistryError> {
        let mut failures = Vec::new();

        for record in records {
            match self.deregister_one(&record.id).await {
                Ok(()) => info!(service_id = %record.id, "Service deregistered"),
                Err(error) => {
                    warn!(service_id = %record.id, error = %error, "Failed to deregister service");
                    failures.push(DeregisterFailure {
                        service_id: record.id.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::PartialDeregister { failures })
        }
    }
}

/// ACL token from `token_file`, falling back to `fallback`.
///
/// An unreadable file is logged and treated as no token.
pub fn read_token(token_file: Option<&Path>, fallback: Option<String>) -> Option<String> {
    match token_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to read Consul token from file");
                None
            }
        },
        None => fallback.filter(|t| !t.is_empty()),
    }
}
