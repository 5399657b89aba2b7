#![allow(dead_code)]

use identity_service::config::{
    ActiveDirectoryConfig, IdentityConfig, JumpCloudConfig, OktaConfig,
};
use identity_service::models::{AccountSource, Source};
use identity_service::services::connectors::mock::demo_user;
use identity_service::services::{ConnectorRegistry, IdentityEngine, MockConnector};
use identity_service::startup::Application;
use secrecy::Secret;
use std::sync::Arc;

pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub engine: IdentityEngine,
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config { port: 0 }, // Random port
        service_name: "identity-service".to_string(),
        use_mock_connectors: false,
        allowed_origins: vec!["http://localhost:3000".to_string()],
        jumpcloud: JumpCloudConfig {
            enabled: false,
            base_url: "https://console.jumpcloud.com".to_string(),
            api_key: Secret::new("test-key".to_string()),
            timeout_secs: 5,
            search_limit: 25,
        },
        okta: OktaConfig {
            enabled: false,
            org_url: "https://example.okta.com".to_string(),
            api_token: Secret::new("test-token".to_string()),
            timeout_secs: 5,
            search_limit: 25,
        },
        active_directory: ActiveDirectoryConfig {
            enabled: false,
            url: "ldap://localhost:389".to_string(),
            bind_dn: "CN=svc,DC=corp,DC=local".to_string(),
            bind_password: Secret::new("secret".to_string()),
            base_dn: "DC=corp,DC=local".to_string(),
            use_starttls: false,
            timeout_secs: 5,
            search_limit: 25,
        },
    }
}

/// Jane exists in all three directories under different native identifiers.
pub fn jane(source: Source) -> AccountSource {
    match source {
        Source::JumpCloud => demo_user(
            source,
            "5f1b2c3d4e5f6a7b8c9d0e1f",
            "jdoe",
            "jane@x.com",
            "Jane",
            "Doe",
        ),
        Source::Okta => demo_user(source, "00u1janedoe", "jane@x.com", "Jane@X.com", "Jane", "Doe"),
        Source::ActiveDirectory => demo_user(
            source,
            "CN=Jane Doe,OU=Staff,DC=corp,DC=local",
            "jane.doe",
            "jane@x.com",
            "Jane",
            "Doe",
        ),
    }
}

pub fn registry_with(connectors: Vec<MockConnector>) -> ConnectorRegistry {
    connectors
        .into_iter()
        .fold(ConnectorRegistry::new(), |registry, connector| {
            registry.with(Arc::new(connector))
        })
}

impl TestApp {
    /// Spawn with the default population in every source.
    pub async fn spawn() -> Self {
        let registry = registry_with(Source::ALL.into_iter().map(MockConnector::demo).collect());
        Self::spawn_with(registry).await
    }

    pub async fn spawn_with(registry: ConnectorRegistry) -> Self {
        let app = Application::build_with_registry(test_config(), registry)
            .await
            .expect("Failed to build test application");

        let http_port = app.http_port();
        let http_address = format!("http://127.0.0.1:{}", http_port);
        let engine = app.engine().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            http_port,
            engine,
        }
    }
}
