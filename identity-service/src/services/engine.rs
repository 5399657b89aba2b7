use futures::future::join_all;

use super::connectors::{ConnectorError, ConnectorRegistry};
use super::dedup::deduplicate;
use super::dispatcher::{dispatch, supports};
use super::error::EngineError;
use super::fanout::fan_out_search;
use super::resolver::resolve_unified_account;
use crate::models::{AccountAction, ActionKind, AggregatedSearchResult, Source, UnifiedAccount};

/// Entry point for identity operations across every registered directory.
#[derive(Clone)]
pub struct IdentityEngine {
    registry: ConnectorRegistry,
}

impl IdentityEngine {
    pub fn new(registry: ConnectorRegistry) -> Self {
        Self { registry }
    }

    pub fn sources(&self) -> Vec<Source> {
        self.registry.sources()
    }

    /// Search every source and group the hits by identity.
    pub async fn search(&self, query: &str) -> Result<Vec<AggregatedSearchResult>, EngineError> {
        let records = fan_out_search(&self.registry, query).await?;
        Ok(deduplicate(records))
    }

    pub async fn get_account(
        &self,
        identifier: &str,
        source_hint: Option<Source>,
    ) -> Result<Option<UnifiedAccount>, EngineError> {
        resolve_unified_account(&self.registry, identifier, source_hint).await
    }

    /// Apply one action to one account. `Ok(false)` means the action was not
    /// applied.
    pub async fn perform_action(
        &self,
        source: Source,
        source_id: &str,
        action: &AccountAction,
    ) -> Result<bool, EngineError> {
        let source_id = source_id.trim();
        if source_id.is_empty() {
            return Err(EngineError::InvalidIdentifier(
                "sourceId must not be empty".to_string(),
            ));
        }
        Ok(dispatch(&self.registry, source, source_id, action).await)
    }

    pub fn supports(&self, source: Source, kind: ActionKind) -> bool {
        supports(source, kind)
    }

    /// Health of every registered connector, in lookup order.
    pub async fn connector_health(&self) -> Vec<(Source, Result<(), ConnectorError>)> {
        let checks = self.registry.iter().map(|connector| async move {
            (connector.source(), connector.health_check().await)
        });
        join_all(checks).await
    }
}
