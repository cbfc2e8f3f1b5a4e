//! Device client unit tests against a mock appliance

use secrecy::SecretString;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigip_client::{BigipError, DeviceClient, DeviceConfig};

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": { "token": "tok-1" }
        })))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> DeviceClient {
    let config = DeviceConfig::new(server.uri(), "admin", SecretString::from("pw".to_string()));
    DeviceClient::connect(&config).await.unwrap()
}

#[tokio::test]
async fn test_connect_performs_login() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let client = connect(&server).await;
    assert_eq!(client.session().token(), "tok-1");
}

#[tokio::test]
async fn test_connect_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mgmt/shared/authn/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let config = DeviceConfig::new(server.uri(), "admin", SecretString::from("pw".to_string()));
    let err = DeviceClient::connect(&config).await.unwrap_err();
    assert!(matches!(err, BigipError::Auth(_)));
}

#[tokio::test]
async fn test_connect_unreachable_device() {
    // Nothing listens on this port.
    let config = DeviceConfig::new(
        "http://127.0.0.1:1",
        "admin",
        SecretString::from("pw".to_string()),
    );
    let err = DeviceClient::connect(&config).await.unwrap_err();
    assert!(matches!(err, BigipError::Auth(_)));
}

#[tokio::test]
async fn test_get_classifies_failure() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/sys/version"))
        .respond_with(ResponseTemplate::new(500).set_body_string("tmm down"))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = client.get::<serde_json::Value>("/mgmt/tm/sys/version").await.unwrap_err();
    match err {
        BigipError::Device { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "tmm down");
        }
        other => panic!("expected device error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_post_with_empty_body_is_none() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/mgmt/tm/sys/config"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let body = client
        .post("/mgmt/tm/sys/config", &serde_json::json!({"command": "save"}))
        .await
        .unwrap();
    assert!(body.is_none());
}

#[tokio::test]
async fn test_delete_distinguishes_absent_from_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/mgmt/tm/sys/crypto/cert/gone.crt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mgmt/tm/sys/crypto/cert/present.crt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mgmt/tm/sys/crypto/cert/broken.crt"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let absent = client.delete("/mgmt/tm/sys/crypto/cert/gone.crt").await.unwrap();
    assert!(absent.was_absent());
    // Second call is the same no-op.
    let absent = client.delete("/mgmt/tm/sys/crypto/cert/gone.crt").await.unwrap();
    assert!(absent.was_absent());

    let deleted = client.delete("/mgmt/tm/sys/crypto/cert/present.crt").await.unwrap();
    assert!(!deleted.was_absent());

    let err = client.delete("/mgmt/tm/sys/crypto/cert/broken.crt").await.unwrap_err();
    assert!(matches!(err, BigipError::Device { status: 503, .. }));
}

#[tokio::test]
async fn test_token_prolong() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/mgmt/shared/authz/tokens/tok-1"))
        .and(body_json(serde_json::json!({"timeout": "36000"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let config = DeviceConfig::new(server.uri(), "admin", SecretString::from("pw".to_string()));
    let client = DeviceClient::connect(&config).await.unwrap();
    let http = reqwest::Client::new();
    client.session().prolong(&http, 36000).await.unwrap();
}
