use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::{Source, UnifiedAccount};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountParams {
    /// Restrict the initial lookup to one source.
    pub source: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(params): Query<AccountParams>,
) -> Result<Json<UnifiedAccount>, AppError> {
    let source_hint = params
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<Source>)
        .transpose()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    match state.engine.get_account(&identifier, source_hint).await? {
        Some(account) => Ok(Json(account)),
        None => Err(AppError::NotFound(anyhow::anyhow!(
            "No account found for '{}'",
            identifier
        ))),
    }
}
