use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};

use crate::startup::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready while at least one directory connector answers.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.engine.connector_health().await;
    let ready = health.iter().any(|(_, result)| result.is_ok());

    let connectors: Map<String, Value> = health
        .into_iter()
        .map(|(source, result)| {
            let entry = match result {
                Ok(()) => json!({ "status": "ok" }),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Connector health check failed");
                    json!({ "status": "unavailable", "error": e.to_string() })
                }
            };
            (source.to_string(), entry)
        })
        .collect();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "unavailable" },
            "connectors": connectors
        })),
    )
}
