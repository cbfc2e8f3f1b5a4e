//! Orchestrator scenario tests
//!
//! The platform collaborators are in-memory fakes that record status
//! writes; the device side is a mock appliance.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use netauto_agent::deploy::connector::DeviceConnector;
use netauto_agent::deploy::orchestrator::{Orchestrator, RunOutcome};
use netauto_agent::deploy::router::HandlerRegistry;
use netauto_agent::errors::AgentError;
use netauto_agent::models::status::DeploymentStatus;
use netauto_agent::platform::{ApplicationContext, EntityStore, ObjectStore, TicketSummary};
use netauto_agent::utils::CooldownOptions;

struct FakeEntityStore {
    cluster_address: String,
    statuses: Mutex<Vec<DeploymentStatus>>,
    branches: Mutex<HashSet<String>>,
    branch_creations: AtomicUsize,
}

impl FakeEntityStore {
    fn new(cluster_address: impl Into<String>) -> Self {
        Self {
            cluster_address: cluster_address.into(),
            statuses: Mutex::new(Vec::new()),
            branches: Mutex::new(HashSet::new()),
            branch_creations: AtomicUsize::new(0),
        }
    }

    fn recorded_statuses(&self) -> Vec<DeploymentStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore for FakeEntityStore {
    async fn application_context(
        &self,
        _kind: &str,
        _id: &str,
        _branch: &str,
    ) -> Result<ApplicationContext, AgentError> {
        Ok(ApplicationContext {
            cluster_address: self.cluster_address.clone(),
            entity_name: "tenant1".to_string(),
        })
    }

    async fn write_deployment_status(
        &self,
        _kind: &str,
        _id: &str,
        status: DeploymentStatus,
    ) -> Result<(), AgentError> {
        self.statuses.lock().unwrap().push(status);
        Ok(())
    }

    async fn ensure_branch(&self, name: &str, _description: &str) -> Result<String, AgentError> {
        let mut branches = self.branches.lock().unwrap();
        if branches.insert(name.to_string()) {
            self.branch_creations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(name.to_string())
    }

    async fn ticket_summary(
        &self,
        _node_id: &str,
        _branch: &str,
    ) -> Result<TicketSummary, AgentError> {
        Ok(TicketSummary {
            ritm: "RITM0000045".to_string(),
            status: "open".to_string(),
            cat_item: "segment".to_string(),
            short_description: "Segment Service Request".to_string(),
            sys_id: "sys-1".to_string(),
        })
    }
}

struct FakeObjectStore {
    artifact: Option<String>,
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn fetch_artifact(&self, _storage_id: &str) -> Result<Option<String>, AgentError> {
        Ok(self.artifact.clone())
    }
}

fn connector() -> DeviceConnector {
    DeviceConnector {
        username: "admin".to_string(),
        password: SecretString::from("pw".to_string()),
        verify_tls: false,
        timeout: Duration::from_secs(5),
        connect_attempts: 3,
        cooldown: CooldownOptions {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        },
    }
}

fn artifact_event() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "node_id": "n-1",
            "checksum": "92a1456e02ded2ebe4a25df68149fdb1",
            "target_id": "T1",
            "storage_id": "S1",
            "target_kind": "NetautoFlexApplication",
            "checksum_previous": "1083e399061bbe4fddc3478492c87225",
            "storage_id_previous": "s-0",
            "artifact_definition_id": "d-1"
        },
        "id": "e-1",
        "branch": "main",
        "account_id": "a-1",
        "occured_at": "2025-06-16 12:38:15.177969+00:00",
        "event": "infrahub.artifact.updated"
    })
}

fn ticket_event() -> serde_json::Value {
    serde_json::json!({
        "id": "e-2",
        "event": "infrahub.node.created",
        "branch": "main",
        "account_id": "a-1",
        "occured_at": "2025-12-11T12:00:00Z",
        "data": {
            "kind": "NetautoServiceNowTicket",
            "action": "created",
            "node_id": "n-2",
            "changelog": {
                "node_id": "n-2",
                "node_kind": "NetautoServiceNowTicket",
                "display_label": "RITM0000045",
                "attributes": {
                    "ritm": {"kind": "Text", "name": "ritm", "value": "RITM0000045"},
                    "cat_item": {"kind": "Dropdown", "name": "cat_item", "value": "segment"}
                }
            }
        }
    })
}

async fn mock_device(server: &MockServer, expect_posts: u64) {
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": { "token": "tok-1" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "perAppDeploymentAllowed": true
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/appsvcs/declare/tenant1/applications"))
        .and(body_json(serde_json::json!({"class": "AS3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(expect_posts)
        .mount(server)
        .await;
}

fn orchestrator(
    entities: Arc<FakeEntityStore>,
    artifact: Option<String>,
) -> Orchestrator {
    Orchestrator::new(
        entities,
        Arc::new(FakeObjectStore { artifact }),
        connector(),
        HandlerRegistry::defaults().unwrap(),
    )
}

#[tokio::test]
async fn test_artifact_deploy_success_writes_running_then_deployed() {
    let server = MockServer::start().await;
    mock_device(&server, 1).await;

    let entities = Arc::new(FakeEntityStore::new(server.uri()));
    let orch = orchestrator(entities.clone(), Some("{\"class\":\"AS3\"}".to_string()));

    let outcome = orch.handle_event(&artifact_event()).await.unwrap();
    match outcome {
        RunOutcome::Deployed { target_id, .. } => assert_eq!(target_id, "T1"),
        other => panic!("expected deploy outcome, got {other:?}"),
    }

    assert_eq!(
        entities.recorded_statuses(),
        vec![DeploymentStatus::Running, DeploymentStatus::Deployed]
    );
}

#[tokio::test]
async fn test_missing_artifact_fails_before_any_declaration_post() {
    let server = MockServer::start().await;
    mock_device(&server, 0).await;

    let entities = Arc::new(FakeEntityStore::new(server.uri()));
    let orch = orchestrator(entities.clone(), None);

    let err = orch.handle_event(&artifact_event()).await.unwrap_err();
    assert!(matches!(err, AgentError::PayloadError(_)));

    assert_eq!(
        entities.recorded_statuses(),
        vec![DeploymentStatus::Running, DeploymentStatus::Failed]
    );
}

#[tokio::test]
async fn test_unparseable_artifact_is_a_payload_error() {
    let server = MockServer::start().await;
    mock_device(&server, 0).await;

    let entities = Arc::new(FakeEntityStore::new(server.uri()));
    let orch = orchestrator(entities.clone(), Some("not json".to_string()));

    let err = orch.handle_event(&artifact_event()).await.unwrap_err();
    assert!(matches!(err, AgentError::PayloadError(_)));
    assert_eq!(
        entities.recorded_statuses(),
        vec![DeploymentStatus::Running, DeploymentStatus::Failed]
    );
}

#[tokio::test]
async fn test_device_rejection_fails_the_run_and_reraises() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": { "token": "tok-1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "perAppDeploymentAllowed": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/appsvcs/declare/tenant1/applications"))
        .respond_with(ResponseTemplate::new(422).set_body_string("declaration invalid"))
        .mount(&server)
        .await;

    let entities = Arc::new(FakeEntityStore::new(server.uri()));
    let orch = orchestrator(entities.clone(), Some("{\"class\":\"AS3\"}".to_string()));

    let err = orch.handle_event(&artifact_event()).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::DeviceError(bigip_client::BigipError::Device { status: 422, .. })
    ));
    assert_eq!(
        entities.recorded_statuses(),
        vec![DeploymentStatus::Running, DeploymentStatus::Failed]
    );
}

#[tokio::test]
async fn test_unsupported_target_kind_is_rejected_before_status_writes() {
    let entities = Arc::new(FakeEntityStore::new("http://127.0.0.1:1"));
    let orch = orchestrator(entities.clone(), None);

    let mut event = artifact_event();
    event["data"]["target_kind"] = serde_json::json!("NetautoSegmentService");

    let err = orch.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, AgentError::UnsupportedTarget(_)));
    assert!(entities.recorded_statuses().is_empty());
}

#[tokio::test]
async fn test_unrecognized_event_type_is_rejected_before_status_writes() {
    let entities = Arc::new(FakeEntityStore::new("http://127.0.0.1:1"));
    let orch = orchestrator(entities.clone(), None);

    let mut event = artifact_event();
    event["event"] = serde_json::json!("infrahub.branch.merged");

    let err = orch.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, AgentError::ValidationError(_)));
    assert!(entities.recorded_statuses().is_empty());
}

#[tokio::test]
async fn test_ticket_branch_is_created_once_across_redeliveries() {
    let entities = Arc::new(FakeEntityStore::new("http://127.0.0.1:1"));
    let orch = orchestrator(entities.clone(), None);

    let first = orch.handle_event(&ticket_event()).await.unwrap();
    let second = orch.handle_event(&ticket_event()).await.unwrap();

    for outcome in [first, second] {
        match outcome {
            RunOutcome::TicketStaged(ticket) => {
                assert_eq!(ticket.branch, "ticket/RITM0000045");
            }
            other => panic!("expected ticket outcome, got {other:?}"),
        }
    }

    assert_eq!(entities.branch_creations.load(Ordering::SeqCst), 1);
    // Tickets are not deployment targets; no status writes happen.
    assert!(entities.recorded_statuses().is_empty());
}

#[tokio::test]
async fn test_device_connect_retries_through_transient_login_failure() {
    let server = MockServer::start().await;
    // First login attempt fails, later ones succeed.
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": { "token": "tok-1" }
        })))
        .mount(&server)
        .await;

    let client = connector().connect(&server.uri()).await.unwrap();
    assert_eq!(client.session().token(), "tok-1");
}
