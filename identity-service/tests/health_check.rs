mod common;

use common::{registry_with, TestApp};
use identity_service::models::Source;
use identity_service::services::{MockConnector, MockOperation};
use reqwest::Client;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/health", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "identity-service");
}

#[tokio::test]
async fn readiness_reports_each_connector() {
    let app = TestApp::spawn_with(registry_with(vec![
        MockConnector::demo(Source::JumpCloud),
        MockConnector::demo(Source::Okta).failing(MockOperation::Health),
    ]))
    .await;

    let response = Client::new()
        .get(&format!("{}/ready", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["connectors"]["jumpcloud"]["status"], "ok");
    assert_eq!(body["connectors"]["okta"]["status"], "unavailable");
}

#[tokio::test]
async fn readiness_fails_when_no_connector_is_healthy() {
    let app = TestApp::spawn_with(registry_with(vec![
        MockConnector::demo(Source::ActiveDirectory).failing(MockOperation::Health),
    ]))
    .await;

    let response = Client::new()
        .get(&format!("{}/ready", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 503);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::spawn().await;

    let response = Client::new()
        .get(&format!("{}/health", app.http_address))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("abc-123")
    );
}
