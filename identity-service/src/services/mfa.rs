use super::connectors::ConnectorRegistry;
use super::metrics::observe;
use crate::models::{AccountSource, MfaDevice};

/// Gather MFA devices for each account in turn, in account order. A source
/// that fails contributes no devices.
pub async fn collect_mfa_devices(
    registry: &ConnectorRegistry,
    accounts: &[AccountSource],
) -> Vec<MfaDevice> {
    let mut devices = Vec::new();

    for account in accounts {
        let Some(connector) = registry.get(account.source) else {
            continue;
        };

        match observe(
            account.source,
            "get_mfa_devices",
            connector.get_mfa_devices(&account.source_id),
        )
        .await
        {
            Ok(found) => devices.extend(found),
            Err(e) => tracing::warn!(
                source = %account.source,
                id = %account.source_id,
                error = %e,
                "Failed to read MFA devices"
            ),
        }
    }

    devices
}
