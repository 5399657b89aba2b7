use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::connectors::{ConnectorRegistry, DirectoryConnector};
use super::dedup::fold_case;
use super::error::EngineError;
use super::metrics::observe;
use super::mfa::collect_mfa_devices;
use crate::models::{AccountSource, RecordType, Source, UnifiedAccount};

/// Resolve an identifier into every linked account across sources.
///
/// With a source hint only that connector is asked for the identifier;
/// otherwise every connector is. Accounts in other sources are then linked
/// through a single email correlation pass seeded from the first account.
#[tracing::instrument(skip(registry))]
pub async fn resolve_unified_account(
    registry: &ConnectorRegistry,
    identifier: &str,
    source_hint: Option<Source>,
) -> Result<Option<UnifiedAccount>, EngineError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(EngineError::InvalidIdentifier(
            "identifier must not be empty".to_string(),
        ));
    }
    if registry.is_empty() {
        return Err(EngineError::NoConnectors);
    }

    AssertUnwindSafe(resolve(registry, identifier, source_hint))
        .catch_unwind()
        .await
        .map_err(|_| {
            tracing::error!(identifier, "Account resolution aborted");
            EngineError::Resolution(format!("failed to resolve '{}'", identifier))
        })
}

async fn resolve(
    registry: &ConnectorRegistry,
    identifier: &str,
    source_hint: Option<Source>,
) -> Option<UnifiedAccount> {
    let targets: Vec<&Arc<dyn DirectoryConnector>> = match source_hint {
        Some(source) => match registry.get(source) {
            Some(connector) => vec![connector],
            None => {
                tracing::warn!(source = %source, "No connector registered for source hint");
                return None;
            }
        },
        None => registry.iter().collect(),
    };

    let lookups = targets
        .into_iter()
        .map(|connector| lookup(connector, identifier));
    let mut accounts: Vec<AccountSource> = join_all(lookups).await.into_iter().flatten().collect();

    let primary_source = accounts.first()?.source;

    let linked = correlate(registry, &accounts).await;
    accounts.extend(linked);

    let mfa_devices = collect_mfa_devices(registry, &accounts).await;

    tracing::info!(
        primary_source = %primary_source,
        accounts = accounts.len(),
        devices = mfa_devices.len(),
        "Account resolved"
    );

    Some(UnifiedAccount {
        primary_source,
        accounts,
        mfa_devices,
    })
}

async fn lookup(connector: &Arc<dyn DirectoryConnector>, id: &str) -> Option<AccountSource> {
    let source = connector.source();
    match observe(source, "get_user", connector.get_user_by_id(id)).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!(source = %source, id, error = %e, "Connector lookup failed");
            None
        }
    }
}

/// Find the anchor email in every source not yet represented. Runs once and
/// never re-seeds from the accounts it discovers.
async fn correlate(registry: &ConnectorRegistry, accounts: &[AccountSource]) -> Vec<AccountSource> {
    let Some(anchor) = accounts
        .first()
        .map(|account| account.email.trim())
        .filter(|email| !email.is_empty())
    else {
        return Vec::new();
    };

    let candidates = registry
        .iter()
        .filter(|connector| !accounts.iter().any(|a| a.source == connector.source()))
        .map(|connector| correlate_one(connector, anchor));

    join_all(candidates).await.into_iter().flatten().collect()
}

async fn correlate_one(connector: &Arc<dyn DirectoryConnector>, anchor: &str) -> Option<AccountSource> {
    let source = connector.source();
    let hits = match observe(source, "search", connector.search_users(anchor)).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Correlation search failed");
            return None;
        }
    };

    let anchor = fold_case(anchor);
    let matching = hits.into_iter().filter(|hit| {
        hit.record_type == RecordType::User
            && hit
                .email
                .as_deref()
                .is_some_and(|email| fold_case(email) == anchor)
    });

    // First matching user that still resolves; at most one per source.
    for hit in matching {
        if let Some(account) = lookup(connector, &hit.id).await {
            return Some(account);
        }
        tracing::debug!(source = %source, id = %hit.id, "Correlation hit did not resolve");
    }
    None
}
