use identity_service::config::OktaConfig;
use identity_service::models::MfaStatus;
use identity_service::services::{ConnectorError, DirectoryConnector, OktaConnector};
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connector(server: &MockServer, enabled: bool) -> OktaConnector {
    OktaConnector::new(OktaConfig {
        enabled,
        org_url: server.uri(),
        api_token: Secret::new("test-token".to_string()),
        timeout_secs: 5,
        search_limit: 20,
    })
    .expect("Failed to build connector")
}

fn okta_user(status: &str) -> serde_json::Value {
    json!({
        "id": "00u1janedoe",
        "status": status,
        "lastLogin": "2024-05-02T08:30:00.000Z",
        "profile": {
            "login": "jane@x.com",
            "email": "jane@x.com",
            "firstName": "Jane",
            "lastName": "Doe"
        }
    })
}

#[tokio::test]
async fn search_sends_ssws_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("Authorization", "SSWS test-token"))
        .and(query_param("q", "jane"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([okta_user("ACTIVE")])))
        .expect(1)
        .mount(&server)
        .await;

    let results = connector(&server, true).search_users("jane").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "00u1janedoe");
    assert_eq!(results[0].email.as_deref(), Some("jane@x.com"));
}

#[tokio::test]
async fn lookup_derives_mfa_from_factors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1janedoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(okta_user("ACTIVE")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1janedoe/factors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "f1", "factorType": "push", "provider": "OKTA", "status": "ACTIVE" }
        ])))
        .mount(&server)
        .await;

    let account = connector(&server, true)
        .get_user_by_id("00u1janedoe")
        .await
        .unwrap()
        .expect("user should exist");
    assert!(account.mfa_enabled);
    assert!(account.enabled);
    assert!(account.last_login.is_some());
}

#[tokio::test]
async fn factor_failure_does_not_fail_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1janedoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(okta_user("SUSPENDED")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1janedoe/factors"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let account = connector(&server, true)
        .get_user_by_id("00u1janedoe")
        .await
        .unwrap()
        .expect("user should exist");
    assert!(!account.mfa_enabled);
    assert!(!account.enabled);
}

#[tokio::test]
async fn factors_map_to_devices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1janedoe/factors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "f1",
                "factorType": "sms",
                "provider": "OKTA",
                "status": "ACTIVE",
                "created": "2023-01-10T10:00:00.000Z",
                "profile": { "phoneNumber": "+15550100" }
            },
            { "id": "f2", "factorType": "token:software:totp", "provider": "GOOGLE", "status": "PENDING_ACTIVATION" }
        ])))
        .mount(&server)
        .await;

    let devices = connector(&server, true)
        .get_mfa_devices("00u1janedoe")
        .await
        .unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "+15550100");
    assert!(devices[0].enrolled_at.is_some());
    assert_eq!(devices[1].status, MfaStatus::Pending);
}

#[tokio::test]
async fn reset_single_factor_deletes_it() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/users/00u1janedoe/factors/f1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(connector(&server, true)
        .reset_mfa("00u1janedoe", Some("f1"))
        .await
        .unwrap());
}

#[tokio::test]
async fn reset_without_factor_resets_all() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/00u1janedoe/lifecycle/reset_factors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(connector(&server, true)
        .reset_mfa("00u1janedoe", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn suspend_missing_user_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/00u-missing/lifecycle/suspend"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!connector(&server, true).suspend("00u-missing").await.unwrap());
}

#[tokio::test]
async fn disabled_connector_is_not_enabled() {
    let server = MockServer::start().await;

    let err = connector(&server, false).search_users("jane").await.unwrap_err();
    assert!(matches!(err, ConnectorError::NotEnabled(_)));
}

#[tokio::test]
async fn empty_query_never_reaches_okta() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = connector(&server, true).search_users("  ").await.unwrap_err();
    assert!(err.is_contract_violation());
}

#[tokio::test]
async fn suspend_keeps_id_in_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/lifecycle/deactivate$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(
            "/api/v1/users/00uVICTIM%2Flifecycle%2Fdeactivate%3Fx%3D/lifecycle/suspend",
        ))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!connector(&server, true)
        .suspend("00uVICTIM/lifecycle/deactivate?x=")
        .await
        .unwrap());
}

#[tokio::test]
async fn factor_id_is_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/users/00u1janedoe/factors/f1%2F..%2F..%2Fusers"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!connector(&server, true)
        .reset_mfa("00u1janedoe", Some("f1/../../users"))
        .await
        .unwrap());
}

#[tokio::test]
async fn dot_segment_id_never_reaches_okta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = connector(&server, true).expire_password("..").await.unwrap_err();
    assert!(err.is_contract_violation());
}

#[tokio::test]
async fn search_skips_undecodable_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            okta_user("ACTIVE"),
            { "id": 7, "status": "ACTIVE", "profile": {} }
        ])))
        .mount(&server)
        .await;

    let results = connector(&server, true).search_users("jane").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "00u1janedoe");
}
