use futures::future::join_all;

use super::connectors::{ConnectorError, ConnectorRegistry};
use super::error::EngineError;
use super::metrics::observe;
use crate::models::SearchResult;

/// Query every registered connector concurrently and concatenate the hits.
///
/// A failed connector is logged and contributes nothing. The call itself only
/// fails when there is nobody to ask, or when every connector refused the
/// query outright.
pub async fn fan_out_search(
    registry: &ConnectorRegistry,
    query: &str,
) -> Result<Vec<SearchResult>, EngineError> {
    if registry.is_empty() {
        return Err(EngineError::NoConnectors);
    }

    let calls = registry.iter().map(|connector| async move {
        let source = connector.source();
        (
            source,
            observe(source, "search", connector.search_users(query)).await,
        )
    });
    let outcomes = join_all(calls).await;

    let mut results = Vec::new();
    let mut rejection: Option<ConnectorError> = None;
    let mut rejected = 0;

    for (source, outcome) in outcomes {
        match outcome {
            Ok(hits) => {
                tracing::debug!(source = %source, count = hits.len(), "Connector search completed");
                results.extend(hits);
            }
            Err(e) if e.is_contract_violation() => {
                rejected += 1;
                rejection = Some(e);
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Connector search failed");
            }
        }
    }

    if rejected == registry.len() {
        if let Some(reason) = rejection {
            return Err(EngineError::AllConnectorsRejected {
                operation: "search",
                reason,
            });
        }
    }

    Ok(results)
}
