//! Declarative port definitions.
//!
//! Port definitions are published by the scheduler as a JSON list, e.g.
//! `[{"port": 31000, "labels": {"service": "true"}}]`. Well-known label keys:
//!
//! - `service=true` marks the port as registrable under the base service name
//! - `probe=true` marks a health-check-only port
//! - `consul=<name>` registers the port under an explicit name
//! - `<key>=tag` adds `<key>` as a literal tag

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

const SERVICE_LABEL: &str = "service";
const PROBE_LABEL: &str = "probe";
const CONSUL_LABEL: &str = "consul";
const TAG_VALUE: &str = "tag";

/// One published port and its labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PortDefinition {
    pub port: u16,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub labels: BTreeMap<String, String>,
}

impl PortDefinition {
    pub fn new(port: u16, labels: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        Self {
            port,
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Carries the generic `service=true` marker.
    pub fn is_service(&self) -> bool {
        self.labels.get(SERVICE_LABEL).is_some_and(|v| v == "true")
    }

    /// Carries the `probe=true` marker.
    pub fn is_probe(&self) -> bool {
        self.labels.get(PROBE_LABEL).is_some_and(|v| v == "true")
    }

    /// Explicit service name from the `consul` label, if non-empty.
    pub fn consul_name(&self) -> Option<&str> {
        self.labels
            .get(CONSUL_LABEL)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Keys of labels whose value is `tag`.
    pub fn tags(&self) -> Vec<String> {
        self.labels
            .iter()
            .filter(|(_, value)| value.as_str() == TAG_VALUE)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Ordered port definitions; index 0 is the implicit default service port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PortDefinitions(Vec<PortDefinition>);

impl PortDefinitions {
    /// Parses the JSON form, tolerating shell quoting around the document.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw.trim().trim_matches('\''))
    }

    /// Whether any entry carries the generic service marker.
    pub fn has_service_port(&self) -> bool {
        self.0.iter().any(PortDefinition::is_service)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PortDefinition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PortDefinition>> for PortDefinitions {
    fn from(definitions: Vec<PortDefinition>) -> Self {
        Self(definitions)
    }
}

impl<'a> IntoIterator for &'a PortDefinitions {
    type Item = &'a PortDefinition;
    type IntoIter = std::slice::Iter<'a, PortDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Label values arrive as strings from most schedulers, but bare JSON
/// booleans and numbers are accepted too.
fn deserialize_labels<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}
