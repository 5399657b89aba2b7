use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::models::AggregatedSearchResult;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    #[validate(length(
        min = 1,
        max = 256,
        message = "Query must be between 1 and 256 characters"
    ))]
    pub q: String,
}

#[tracing::instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<AggregatedSearchResult>>, AppError> {
    params.validate()?;

    let results = state.engine.search(&params.q).await?;

    tracing::info!(query = %params.q, identities = results.len(), "Search completed");
    Ok(Json(results))
}
