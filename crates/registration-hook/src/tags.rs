//! Tag composition for registration records.
//!
//! Tags are concatenated from fixed sources in a fixed order:
//!
//! 1. identity tags (`k8sPodName: ..`, `k8sPodNamespace: ..`)
//! 2. failure-domain tags from node topology labels (best effort)
//! 3. annotation tags (`CONSUL_TAG_*` annotations)
//! 4. literal tags of the port definition
//! 5. the instance tag `instance:<workload>_<port>`
//!
//! followed by `service-port:<port>` when a service-port override is set and
//! no such tag exists yet. Sources 1-3 are the global tags; secured records
//! drop every global tag carrying the load-balancer prefix.

use tracing::{debug, warn};

use crate::source::WorkloadSource;
use crate::workload::WorkloadDescriptor;

/// Annotation key prefix whose values become tags.
pub const ANNOTATION_TAG_PREFIX: &str = "CONSUL_TAG_";
const SERVICE_PORT_TAG_PREFIX: &str = "service-port:";

/// Values of every `CONSUL_TAG_*` annotation with a non-empty value.
///
/// Annotations have no meaningful order, so callers must treat the relative
/// order of these tags as unspecified.
pub fn annotation_tags(workload: &WorkloadDescriptor) -> Vec<String> {
    workload
        .annotations
        .iter()
        .filter(|(key, value)| key.starts_with(ANNOTATION_TAG_PREFIX) && !value.is_empty())
        .map(|(_, value)| value.clone())
        .collect()
}

/// `k8sPodName`/`k8sPodNamespace` tags, only when both are known.
pub fn identity_tags(pod_name: &str, pod_namespace: &str) -> Vec<String> {
    if pod_name.is_empty() || pod_namespace.is_empty() {
        return Vec::new();
    }
    vec![
        format!("k8sPodName: {pod_name}"),
        format!("k8sPodNamespace: {pod_namespace}"),
    ]
}

/// Failure-domain tags, or `None` with a warning when they cannot be read.
pub async fn failure_domain_tags(
    source: &dyn WorkloadSource,
    workload: &WorkloadDescriptor,
) -> Option<Vec<String>> {
    match source.failure_domain_tags(workload).await {
        Ok(tags) => {
            debug!(pod = %workload.name, count = tags.len(), "Resolved failure domain tags");
            Some(tags)
        }
        Err(e) => {
            warn!(
                pod = %workload.name,
                error = %e,
                "Won't include failure domain data in registration"
            );
            None
        }
    }
}

pub fn instance_tag(workload_name: &str, port: u16) -> String {
    format!("instance:{workload_name}_{port}")
}

/// Builds per-record tag lists from the workload-wide sources.
#[derive(Debug, Clone, Default)]
pub struct TagComposer {
    global: Vec<String>,
    workload_name: String,
    service_port: Option<u16>,
    lb_tag_prefix: String,
}

impl TagComposer {
    pub fn new(workload_name: impl Into<String>) -> Self {
        Self {
            workload_name: workload_name.into(),
            ..Self::default()
        }
    }

    /// Appends global tags; call in source order.
    #[must_use]
    pub fn with_global_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.global.extend(tags);
        self
    }

    #[must_use]
    pub fn with_service_port(mut self, service_port: Option<u16>) -> Self {
        self.service_port = service_port;
        self
    }

    #[must_use]
    pub fn with_lb_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lb_tag_prefix = prefix.into();
        self
    }

    /// Final tag list for one record.
    pub fn compose(&self, port: u16, port_tags: &[String], secured: bool) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.global.len() + port_tags.len() + 2);

        tags.extend(
            self.global
                .iter()
                .filter(|tag| !(secured && self.is_lb_tag(tag)))
                .cloned(),
        );
        tags.extend(port_tags.iter().cloned());
        tags.push(instance_tag(&self.workload_name, port));

        if let Some(service_port) = self.service_port {
            if !tags.iter().any(|tag| tag.starts_with(SERVICE_PORT_TAG_PREFIX)) {
                tags.push(format!("{SERVICE_PORT_TAG_PREFIX}{service_port}"));
            }
        }

        tags
    }

    fn is_lb_tag(&self, tag: &str) -> bool {
        !self.lb_tag_prefix.is_empty() && tag.starts_with(&self.lb_tag_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    fn workload_with_annotations(annotations: &[(&str, &str)]) -> WorkloadDescriptor {
        WorkloadDescriptor {
            name: "app-7d9f".to_string(),
            annotations: annotations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..WorkloadDescriptor::default()
        }
    }

    fn as_set(tags: &[String]) -> HashSet<&str> {
        tags.iter().map(String::as_str).collect()
    }

    // Annotation order is unspecified, so these tests compare membership.
    #[test]
    fn test_annotation_tags_skip_empty_values() {
        let workload = workload_with_annotations(&[
            ("CONSUL_TAG_0", "KEY0: VALUE0"),
            ("CONSUL_TAG_1", ""),
            ("CONSUL_TAG_1_a", "KEY2: VALUE2"),
            ("unrelated", "ignored"),
        ]);

        let tags = annotation_tags(&workload);
        assert_eq!(tags.len(), 2);
        assert_eq!(as_set(&tags), HashSet::from(["KEY0: VALUE0", "KEY2: VALUE2"]));
    }

    #[test]
    fn test_annotation_tags_keep_duplicate_values() {
        let workload = workload_with_annotations(&[
            ("CONSUL_TAG_0", "KEY0: VALUE0"),
            ("CONSUL_TAG_1", "KEY0: VALUE0"),
        ]);

        assert_eq!(annotation_tags(&workload).len(), 2);
    }

    #[test]
    fn test_identity_tags_need_name_and_namespace() {
        assert_eq!(
            identity_tags("app-7d9f", "default"),
            vec!["k8sPodName: app-7d9f", "k8sPodNamespace: default"]
        );
        assert!(identity_tags("app-7d9f", "").is_empty());
        assert!(identity_tags("", "default").is_empty());
    }

    #[test]
    fn test_compose_orders_sources() {
        let composer = TagComposer::new("app-7d9f")
            .with_global_tags(identity_tags("app-7d9f", "default"))
            .with_global_tags(vec!["zone:dc1".to_string()])
            .with_global_tags(vec!["lb-public".to_string()]);

        let tags = composer.compose(31000, &["frontend".to_string()], false);
        assert_eq!(
            tags,
            vec![
                "k8sPodName: app-7d9f",
                "k8sPodNamespace: default",
                "zone:dc1",
                "lb-public",
                "frontend",
                "instance:app-7d9f_31000",
            ]
        );
    }

    #[test]
    fn test_secured_records_drop_lb_tags() {
        let composer = TagComposer::new("app-7d9f")
            .with_global_tags(vec!["lb-public".to_string(), "team:core".to_string()])
            .with_lb_tag_prefix("lb-");

        let secured = composer.compose(31002, &[], true);
        assert!(secured.iter().all(|tag| !tag.starts_with("lb-")));
        assert!(secured.contains(&"team:core".to_string()));

        let plain = composer.compose(31000, &[], false);
        assert!(plain.contains(&"lb-public".to_string()));
    }

    #[test]
    fn test_service_port_tag_added_once() {
        let composer = TagComposer::new("app-7d9f").with_service_port(Some(8080));
        let tags = composer.compose(31000, &[], false);
        assert_eq!(tags.last().map(String::as_str), Some("service-port:8080"));

        let composer = TagComposer::new("app-7d9f")
            .with_global_tags(vec!["service-port:9090".to_string()])
            .with_service_port(Some(8080));
        let tags = composer.compose(31000, &[], false);
        assert_eq!(
            tags.iter().filter(|t| t.starts_with("service-port:")).count(),
            1
        );
        assert!(tags.contains(&"service-port:9090".to_string()));
    }
}
