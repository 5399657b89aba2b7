use super::connectors::ConnectorRegistry;
use super::metrics::observe;
use crate::models::{AccountAction, ActionKind, Source};

/// Whether a source can perform an action at all.
pub fn supports(source: Source, kind: ActionKind) -> bool {
    !matches!(
        (source, kind),
        // MFA for directory accounts is enforced by a separate system.
        (Source::ActiveDirectory, ActionKind::ResetMfa)
    )
}

/// Route one action to the connector that owns the account.
///
/// Never retries. Unsupported actions, unknown sources and connector failures
/// all come back as `false`.
#[tracing::instrument(skip(registry, action), fields(action = %action.kind()))]
pub async fn dispatch(
    registry: &ConnectorRegistry,
    source: Source,
    source_id: &str,
    action: &AccountAction,
) -> bool {
    let kind = action.kind();
    if !supports(source, kind) {
        tracing::warn!(source = %source, action = %kind, "Action not supported by source");
        return false;
    }

    let Some(connector) = registry.get(source) else {
        tracing::warn!(source = %source, "No connector registered for source");
        return false;
    };

    let outcome = match action {
        AccountAction::Update(patch) => {
            observe(source, "update", connector.update_user(source_id, patch)).await
        }
        AccountAction::ExpirePassword => {
            observe(source, "expire_password", connector.expire_password(source_id)).await
        }
        AccountAction::ResetMfa { factor_id } => {
            observe(
                source,
                "reset_mfa",
                connector.reset_mfa(source_id, factor_id.as_deref()),
            )
            .await
        }
        AccountAction::Suspend => observe(source, "suspend", connector.suspend(source_id)).await,
    };

    match outcome {
        Ok(applied) => {
            tracing::info!(source = %source, source_id, applied, "Action dispatched");
            applied
        }
        Err(e) => {
            tracing::warn!(source = %source, source_id, error = %e, "Action failed");
            false
        }
    }
}
