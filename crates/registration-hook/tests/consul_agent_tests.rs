//! Consul agent client against a mock agent.

use std::time::Duration;

use registration_hook::{
    CheckDescriptor, CheckKind, ConsulAgent, RegistryError, RegistrySink, ServiceRecord,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: &str) -> ServiceRecord {
    ServiceRecord {
        id: id.to_string(),
        name: "svc".to_string(),
        host: "192.0.2.2".to_string(),
        port: 8080,
        check: Some(CheckDescriptor {
            kind: CheckKind::HttpGet,
            address: "http://192.0.2.2:8080/status/ping".to_string(),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1),
        }),
        tags: vec!["instance:app-7d9f_8080".to_string()],
    }
}

#[tokio::test]
async fn test_register_sends_agent_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .and(header("X-Consul-Token", "secret"))
        .and(body_json(json!({
            "ID": "192.0.2.2_8080",
            "Name": "svc",
            "Tags": ["instance:app-7d9f_8080"],
            "Address": "192.0.2.2",
            "Port": 8080,
            "Check": {
                "HTTP": "http://192.0.2.2:8080/status/ping",
                "Method": "GET",
                "Interval": "10s",
                "Timeout": "1s"
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let agent = ConsulAgent::new(server.uri(), Some("secret".to_string())).unwrap();
    agent.register(&[record("192.0.2.2_8080")]).await.unwrap();
}

#[tokio::test]
async fn test_register_stops_at_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("rpc error"))
        .expect(1)
        .mount(&server)
        .await;

    let agent = ConsulAgent::new(server.uri(), None).unwrap();
    let err = agent
        .register(&[record("192.0.2.2_8080"), record("192.0.2.2_8081")])
        .await
        .unwrap_err();

    match err {
        RegistryError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "rpc error");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_deregister_attempts_every_record() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/192.0.2.2_8080"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown service"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/192.0.2.2_8081"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let agent = ConsulAgent::new(server.uri(), None).unwrap();
    let err = agent
        .deregister(&[record("192.0.2.2_8080"), record("192.0.2.2_8081")])
        .await
        .unwrap_err();

    let RegistryError::PartialDeregister { failures } = err else {
        panic!("expected partial deregister failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].service_id, "192.0.2.2_8080");
}

#[tokio::test]
async fn test_deregister_all_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let agent = ConsulAgent::new(format!("{}/", server.uri()), None).unwrap();
    agent
        .deregister(&[record("192.0.2.2_8080"), record("192.0.2.2_8080-secured")])
        .await
        .unwrap();
}
