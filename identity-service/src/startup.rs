//! Application startup and lifecycle management.

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::IdentityConfig;
use crate::handlers;
use crate::models::Source;
use crate::services::{
    ActiveDirectoryConnector, ConnectorError, ConnectorRegistry, IdentityEngine,
    JumpCloudConnector, MockConnector, OktaConnector,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub engine: IdentityEngine,
}

/// Register a connector for every enabled backend.
pub fn build_connectors(config: &IdentityConfig) -> Result<ConnectorRegistry, ConnectorError> {
    let mut registry = ConnectorRegistry::new();

    if config.use_mock_connectors {
        tracing::warn!("Using mock directory connectors");
        for source in Source::ALL {
            registry.register(Arc::new(MockConnector::demo(source)));
        }
        return Ok(registry);
    }

    if config.jumpcloud.enabled {
        registry.register(Arc::new(JumpCloudConnector::new(config.jumpcloud.clone())?));
        tracing::info!("JumpCloud connector initialized");
    } else {
        tracing::info!("JumpCloud connector disabled");
    }

    if config.okta.enabled {
        registry.register(Arc::new(OktaConnector::new(config.okta.clone())?));
        tracing::info!("Okta connector initialized");
    } else {
        tracing::info!("Okta connector disabled");
    }

    if config.active_directory.enabled {
        registry.register(Arc::new(ActiveDirectoryConnector::new(
            config.active_directory.clone(),
        )?));
        tracing::info!("Active Directory connector initialized");
    } else {
        tracing::info!("Active Directory connector disabled");
    }

    if registry.is_empty() {
        tracing::warn!("No directory connectors enabled; identity endpoints will be unavailable");
    }

    Ok(registry)
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/identity/search", get(handlers::search))
        .route("/identity/accounts/:identifier", get(handlers::get_account))
        .route("/identity/actions", post(handlers::perform_action))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with connectors taken from the configuration.
    pub async fn build(config: IdentityConfig) -> Result<Self, AppError> {
        let registry = build_connectors(&config).map_err(|e| {
            tracing::error!("Failed to initialize directory connectors: {}", e);
            AppError::ConfigError(anyhow::anyhow!(e))
        })?;
        Self::build_with_registry(config, registry).await
    }

    /// Build the application around an explicit set of connectors.
    pub async fn build_with_registry(
        config: IdentityConfig,
        registry: ConnectorRegistry,
    ) -> Result<Self, AppError> {
        tracing::info!(sources = ?registry.sources(), "Directory connectors registered");

        let state = AppState {
            config: config.clone(),
            engine: IdentityEngine::new(registry),
        };

        // Bind HTTP listener (port 0 = random port for testing)
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Identity service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn engine(&self) -> &IdentityEngine {
        &self.state.engine
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.http_listener, router).await
    }

    /// Run the application until the shutdown future completes.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
