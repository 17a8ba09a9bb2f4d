//! Register and deregister flows over an in-memory cluster and registry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use registration_hook::{
    Container, ContainerPort, HookConfig, HookError, Probe, RegisterOutcome, RegistrationHook,
    RegistryError, RegistrySink, ServiceRecord, SourceError, WorkloadDescriptor, WorkloadSource,
};
use tokio_util::sync::CancellationToken;

struct StaticSource {
    workload: WorkloadDescriptor,
    zone: Option<String>,
}

#[async_trait]
impl WorkloadSource for StaticSource {
    async fn fetch(&self, _namespace: &str, _name: &str) -> Result<WorkloadDescriptor, SourceError> {
        Ok(self.workload.clone())
    }

    async fn failure_domain_tags(
        &self,
        workload: &WorkloadDescriptor,
    ) -> Result<Vec<String>, SourceError> {
        self.zone
            .as_ref()
            .map(|zone| vec![format!("zone:{zone}")])
            .ok_or_else(|| SourceError::NoFailureDomain(workload.name.clone()))
    }

    async fn active_check(&self, _probe: &Probe, _host: &str) -> Result<(), SourceError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    registered: Mutex<Vec<ServiceRecord>>,
    deregistered: Mutex<Vec<String>>,
}

#[async_trait]
impl RegistrySink for RecordingSink {
    async fn register(&self, records: &[ServiceRecord]) -> Result<(), RegistryError> {
        self.registered.lock().unwrap().extend_from_slice(records);
        Ok(())
    }

    async fn deregister(&self, records: &[ServiceRecord]) -> Result<(), RegistryError> {
        self.deregistered
            .lock()
            .unwrap()
            .extend(records.iter().map(|r| r.id.clone()));
        Ok(())
    }
}

fn workload(address: &str) -> WorkloadDescriptor {
    WorkloadDescriptor {
        name: "app-7d9f".to_string(),
        namespace: "default".to_string(),
        address: address.to_string(),
        containers: vec![Container {
            name: "app".to_string(),
            ports: vec![ContainerPort {
                name: None,
                port: 8080,
            }],
            ..Container::default()
        }],
        labels: BTreeMap::from([("consul".to_string(), "svc".to_string())]),
        node_name: Some("node-1".to_string()),
        ..WorkloadDescriptor::default()
    }
}

fn hook(
    workload: WorkloadDescriptor,
    sink: Arc<RecordingSink>,
    config: HookConfig,
) -> RegistrationHook {
    let source = StaticSource {
        workload,
        zone: None,
    };
    RegistrationHook::new(Arc::new(source), sink, config)
}

#[tokio::test]
async fn test_labelled_pod_registers_one_record_without_check() {
    let sink = Arc::new(RecordingSink::default());
    let hook = hook(
        workload("192.0.2.2"),
        Arc::clone(&sink),
        HookConfig::new("default", "app-7d9f"),
    );

    let outcome = hook.register(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, RegisterOutcome::Registered(1));
    let registered = sink.registered.lock().unwrap();
    assert_eq!(registered[0].name, "svc");
    assert_eq!(registered[0].port, 8080);
    assert!(registered[0].check.is_none());
    assert_eq!(
        *sink.deregistered.lock().unwrap(),
        vec!["192.0.2.2_8080-secured".to_string()]
    );
}

#[tokio::test]
async fn test_port_definitions_register_plain_and_secured() {
    let sink = Arc::new(RecordingSink::default());
    let config = HookConfig::new("default", "app-7d9f")
        .with_raw_port_definitions(Some(
            r#"[
                {"port": 31000, "labels": {"service": "true"}},
                {"port": 31001, "labels": {"probe": "true"}},
                {"port": 31002, "labels": {"consul": "svc-secured"}}
            ]"#,
        ))
        .unwrap();
    let hook = hook(workload("192.0.2.2"), Arc::clone(&sink), config);

    let outcome = hook.register(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, RegisterOutcome::Registered(2));
    let registered = sink.registered.lock().unwrap();
    assert_eq!(registered[0].name, "svc");
    assert_eq!(registered[0].port, 31000);
    assert!(!registered[0].is_secured());
    assert_eq!(registered[1].name, "svc-secured");
    assert_eq!(registered[1].port, 31002);
    assert!(registered[1].is_secured());
    assert!(registered.iter().all(|r| r.port != 31001));
}

#[tokio::test]
async fn test_secured_records_drop_lb_annotations() {
    let sink = Arc::new(RecordingSink::default());
    let mut pod = workload("192.0.2.2");
    pod.annotations = BTreeMap::from([
        ("CONSUL_TAG_0".to_string(), "lb-public".to_string()),
        ("CONSUL_TAG_1".to_string(), "team:core".to_string()),
    ]);
    let config = HookConfig::new("default", "app-7d9f")
        .with_raw_port_definitions(Some(
            r#"[{"port": 31000, "labels": {"service": "true"}},
                {"port": 31002, "labels": {"consul": "svc-secured"}}]"#,
        ))
        .unwrap();
    let hook = hook(pod, Arc::clone(&sink), config);

    hook.register(&CancellationToken::new()).await.unwrap();

    let registered = sink.registered.lock().unwrap();
    assert!(registered[0].tags.contains(&"lb-public".to_string()));
    assert!(registered[1].tags.contains(&"team:core".to_string()));
    assert!(registered[1].tags.iter().all(|t| !t.starts_with("lb-")));
}

#[tokio::test]
async fn test_unlabelled_pod_is_a_noop() {
    let sink = Arc::new(RecordingSink::default());
    let mut pod = workload("192.0.2.2");
    pod.labels.clear();
    let hook = hook(pod, Arc::clone(&sink), HookConfig::new("default", "app-7d9f"));

    let outcome = hook.register(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, RegisterOutcome::NothingToRegister);
    assert!(sink.registered.lock().unwrap().is_empty());
    assert_eq!(hook.deregister(&CancellationToken::new()).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pod_without_address_times_out() {
    let sink = Arc::new(RecordingSink::default());
    let config = HookConfig::new("default", "app-7d9f").with_pod_timeout(Duration::from_secs(3));
    let hook = hook(workload(""), Arc::clone(&sink), config);

    let err = hook.register(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, HookError::ResolutionTimeout(_)));
    assert!(sink.registered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_deregister_removes_every_record() {
    let sink = Arc::new(RecordingSink::default());
    let hook = hook(
        workload("192.0.2.2"),
        Arc::clone(&sink),
        HookConfig::new("default", "app-7d9f"),
    );

    let count = hook.deregister(&CancellationToken::new()).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(
        *sink.deregistered.lock().unwrap(),
        vec!["192.0.2.2_8080".to_string()]
    );
}

#[tokio::test]
async fn test_cancelled_before_resolution() {
    let sink = Arc::new(RecordingSink::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let hook = hook(
        workload(""),
        Arc::clone(&sink),
        HookConfig::new("default", "app-7d9f"),
    );

    let err = hook.register(&cancel).await.unwrap_err();

    assert!(matches!(err, HookError::Cancelled));
}
