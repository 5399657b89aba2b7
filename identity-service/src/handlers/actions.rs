use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use crate::models::{AccountAction, ActionKind, Source};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: ActionKind,
    pub source: Source,
    #[validate(length(min = 1, message = "sourceId must not be empty"))]
    pub source_id: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub action: ActionKind,
    pub source: Source,
    pub source_id: String,
}

#[tracing::instrument(skip(state, request), fields(action = %request.action, source = %request.source))]
pub async fn perform_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    request.validate()?;

    if !state.engine.supports(request.source, request.action) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Action '{}' is not supported for {}",
            request.action,
            request.source
        )));
    }

    let action = AccountAction::from_parts(request.action, request.payload)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid payload: {}", e)))?;

    if let AccountAction::Update(patch) = &action {
        if patch.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Update payload contains no fields"
            )));
        }
        patch.validate()?;
    }

    let applied = state
        .engine
        .perform_action(request.source, &request.source_id, &action)
        .await?;

    if !applied {
        return Err(AppError::BadGateway(format!(
            "{} did not apply '{}' to {}",
            request.source, request.action, request.source_id
        )));
    }

    Ok(Json(ActionResponse {
        success: true,
        action: request.action,
        source: request.source,
        source_id: request.source_id,
    }))
}
