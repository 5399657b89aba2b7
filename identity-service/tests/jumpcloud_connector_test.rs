use identity_service::config::JumpCloudConfig;
use identity_service::models::{MfaStatus, UserPatch};
use identity_service::services::{ConnectorError, DirectoryConnector, JumpCloudConnector};
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_ID: &str = "5f1b2c3d4e5f6a7b8c9d0e1f";

fn connector(server: &MockServer) -> JumpCloudConnector {
    JumpCloudConnector::new(JumpCloudConfig {
        enabled: true,
        base_url: server.uri(),
        api_key: Secret::new("test-key".to_string()),
        timeout_secs: 5,
        search_limit: 10,
    })
    .expect("Failed to build connector")
}

fn system_user() -> serde_json::Value {
    json!({
        "_id": USER_ID,
        "username": "jdoe",
        "email": "jane@x.com",
        "firstname": "Jane",
        "lastname": "Doe",
        "activated": true,
        "suspended": false,
        "account_locked": false,
        "totp_enabled": true
    })
}

#[tokio::test]
async fn search_posts_search_filter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/systemusers"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({
            "searchFilter": { "searchTerm": "jane" },
            "limit": 10
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "totalCount": 1, "results": [system_user()] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = connector(&server).search_users("jane").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, USER_ID);
    assert_eq!(results[0].email.as_deref(), Some("jane@x.com"));
    assert_eq!(results[0].username.as_deref(), Some("jdoe"));
    assert_eq!(results[0].display_name, "Jane Doe");
}

#[tokio::test]
async fn lookup_by_username_uses_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/systemusers"))
        .and(query_param("filter", "username:$eq:jdoe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "totalCount": 1, "results": [system_user()] })),
        )
        .mount(&server)
        .await;

    let account = connector(&server)
        .get_user_by_id("jdoe")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(account.source_id, USER_ID);
    assert!(account.enabled);
    assert!(account.mfa_enabled);
}

#[tokio::test]
async fn missing_user_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/systemusers/{}", USER_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let account = connector(&server).get_user_by_id(USER_ID).await.unwrap();
    assert!(account.is_none());
}

#[tokio::test]
async fn mfa_devices_include_totp_and_push() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/systemusers/{}", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(system_user()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/users/{}/pushendpoints", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "push-1", "name": "Jane's phone", "state": "ACTIVE" }
        ])))
        .mount(&server)
        .await;

    let devices = connector(&server).get_mfa_devices(USER_ID).await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].id, "push-1");
    assert_eq!(devices[1].status, MfaStatus::Active);
}

#[tokio::test]
async fn suspend_puts_flag() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/api/systemusers/{}", USER_ID)))
        .and(body_partial_json(json!({ "suspended": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(system_user()))
        .expect(1)
        .mount(&server)
        .await;

    assert!(connector(&server).suspend(USER_ID).await.unwrap());
}

#[tokio::test]
async fn update_sends_changed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/api/systemusers/{}", USER_ID)))
        .and(body_partial_json(json!({ "lastname": "Smith" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(system_user()))
        .expect(1)
        .mount(&server)
        .await;

    let patch = UserPatch {
        last_name: Some("Smith".to_string()),
        ..Default::default()
    };
    assert!(connector(&server).update_user(USER_ID, &patch).await.unwrap());
}

#[tokio::test]
async fn write_to_missing_user_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/systemusers/{}/expire", USER_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!connector(&server).expire_password(USER_ID).await.unwrap());
}

#[tokio::test]
async fn rejected_key_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/systemusers"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = connector(&server).search_users("jane").await.unwrap_err();
    assert!(matches!(err, ConnectorError::Authentication(_)));
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/systemusers/{}/resetmfa", USER_ID)))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = connector(&server).reset_mfa(USER_ID, None).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Api { status: 500, .. }));
}

#[tokio::test]
async fn expire_keeps_id_in_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/api/systemusers/victim"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/systemusers/jdoe%2F..%2Fvictim/expire"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!connector(&server)
        .expire_password("jdoe/../victim")
        .await
        .unwrap());
}

#[tokio::test]
async fn username_with_filter_syntax_is_a_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "totalCount": 1, "results": [system_user()] })),
        )
        .expect(0)
        .mount(&server)
        .await;

    let account = connector(&server)
        .get_user_by_id("jdoe,email:$eq:jane@x.com")
        .await
        .unwrap();
    assert!(account.is_none());
}

#[tokio::test]
async fn search_tolerates_nulls_and_skips_bad_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/systemusers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 3,
            "results": [
                system_user(),
                { "_id": "5f1b2c3d4e5f6a7b8c9d0e2a", "username": "jroe", "displayname": null, "email": null },
                { "_id": 42, "username": "broken" }
            ]
        })))
        .mount(&server)
        .await;

    let results = connector(&server).search_users("j").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].username.as_deref(), Some("jroe"));
    assert_eq!(results[1].email, None);
}
