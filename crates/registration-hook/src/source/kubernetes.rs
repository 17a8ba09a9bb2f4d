//! Kubernetes-backed [`WorkloadSource`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{Api, Client};
use reqwest::Client as HttpClient;
use tracing::{debug, instrument};

use super::{check, WorkloadSource};
use crate::error::SourceError;
use crate::workload::{Probe, WorkloadDescriptor};

/// Node label prefixes describing the failure domain.
const FAILURE_DOMAIN_PREFIXES: &[&str] = &[
    "failure-domain.beta.kubernetes.io/",
    "topology.kubernetes.io/",
];

/// Reads pods and nodes from the Kubernetes API and probes pod endpoints.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    http: HttpClient,
}

impl KubeSource {
    /// Wrap an existing Kubernetes client.
    pub fn new(client: Client) -> Result<Self, SourceError> {
        Ok(Self {
            client,
            http: check::client()?,
        })
    }

    /// Client from the in-cluster service account or the local kubeconfig.
    pub async fn try_default() -> Result<Self, SourceError> {
        let client = Client::try_default().await?;
        Self::new(client)
    }
}

#[async_trait]
impl WorkloadSource for KubeSource {
    #[instrument(skip(self))]
    async fn fetch(&self, namespace: &str, name: &str) -> Result<WorkloadDescriptor, SourceError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = pods.get(name).await?;
        Ok(WorkloadDescriptor::from(&pod))
    }

    #[instrument(skip(self, workload), fields(pod = %workload.name))]
    async fn failure_domain_tags(
        &self,
        workload: &WorkloadDescriptor,
    ) -> Result<Vec<String>, SourceError> {
        let node_name = workload
            .node_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SourceError::MissingNodeName(workload.name.clone()))?;

        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get(node_name).await?;
        let labels = node.metadata.labels.unwrap_or_default();

        let tags = topology_tags(&labels);
        debug!(node = %node_name, count = tags.len(), "Read node topology labels");
        if tags.is_empty() {
            return Err(SourceError::NoFailureDomain(node_name.to_string()));
        }
        Ok(tags)
    }

    async fn active_check(&self, probe: &Probe, host: &str) -> Result<(), SourceError> {
        check::run(&self.http, probe, host).await
    }
}

/// `<suffix>:<value>` for every failure-domain label.
pub fn topology_tags(labels: &BTreeMap<String, String>) -> Vec<String> {
    labels
        .iter()
        .filter_map(|(key, value)| {
            FAILURE_DOMAIN_PREFIXES
                .iter()
                .find_map(|prefix| key.strip_prefix(prefix))
                .map(|suffix| format!("{suffix}:{value}"))
        })
        .collect()
}
