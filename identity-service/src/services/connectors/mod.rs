//! Directory connector abstractions and implementations.
//!
//! Each backend (JumpCloud, Okta, Active Directory) sits behind the
//! [`DirectoryConnector`] trait so the aggregation engine never sees a
//! backend-specific API.

pub mod active_directory;
mod http;
pub mod jumpcloud;
pub mod mock;
pub mod okta;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{AccountSource, MfaDevice, SearchResult, Source, UserPatch};

pub use active_directory::ActiveDirectoryConnector;
pub use jumpcloud::JumpCloudConnector;
pub use mock::{MockConnector, MockOperation};
pub use okta::OktaConnector;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Connector not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ConnectorError {
    /// The call was rejected before any request was issued.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ConnectorError::InvalidRequest(_))
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::NotEnabled(_) => "not_enabled",
            ConnectorError::Configuration(_) => "configuration",
            ConnectorError::Connection(_) => "connection",
            ConnectorError::Timeout(_) => "timeout",
            ConnectorError::Authentication(_) => "authentication",
            ConnectorError::Api { .. } => "api",
            ConnectorError::InvalidRequest(_) => "invalid_request",
            ConnectorError::Unsupported(_) => "unsupported",
            ConnectorError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectorError::Timeout(err.to_string())
        } else if err.is_decode() {
            ConnectorError::Decode(err.to_string())
        } else if err.is_builder() {
            ConnectorError::InvalidRequest(err.to_string())
        } else {
            ConnectorError::Connection(err.to_string())
        }
    }
}

/// Uniform capability contract of one directory backend.
///
/// Every method rejects on transport or authentication failure; "not found"
/// is expressed as `Ok(None)` or `Ok(false)`, never as an error.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    fn source(&self) -> Source;

    async fn search_users(&self, query: &str) -> Result<Vec<SearchResult>, ConnectorError>;

    /// Look up a record by the backend's native identifier. Identifiers that
    /// are not meaningful for this backend are a miss.
    async fn get_user_by_id(&self, id: &str) -> Result<Option<AccountSource>, ConnectorError>;

    async fn get_mfa_devices(&self, id: &str) -> Result<Vec<MfaDevice>, ConnectorError>;

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<bool, ConnectorError>;

    async fn expire_password(&self, id: &str) -> Result<bool, ConnectorError>;

    async fn reset_mfa(&self, id: &str, factor_id: Option<&str>) -> Result<bool, ConnectorError>;

    async fn suspend(&self, id: &str) -> Result<bool, ConnectorError>;

    async fn health_check(&self) -> Result<(), ConnectorError>;
}

/// The set of connectors an engine works against, at most one per source.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<Source, Arc<dyn DirectoryConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector, replacing any previous one for the same source.
    pub fn register(&mut self, connector: Arc<dyn DirectoryConnector>) {
        self.connectors.insert(connector.source(), connector);
    }

    pub fn with(mut self, connector: Arc<dyn DirectoryConnector>) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, source: Source) -> Option<&Arc<dyn DirectoryConnector>> {
        self.connectors.get(&source)
    }

    /// Connectors in canonical lookup order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DirectoryConnector>> {
        self.connectors.values()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.connectors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

/// Reject blank queries before they reach a backend.
pub(crate) fn validate_query(query: &str) -> Result<&str, ConnectorError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::InvalidRequest(
            "Search query is empty".to_string(),
        ));
    }
    Ok(trimmed)
}

pub(crate) fn validate_id(id: &str) -> Result<&str, ConnectorError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::InvalidRequest(
            "Identifier is empty".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_iterates_in_lookup_order() {
        let registry = ConnectorRegistry::new()
            .with(Arc::new(MockConnector::new(Source::ActiveDirectory)))
            .with(Arc::new(MockConnector::new(Source::JumpCloud)))
            .with(Arc::new(MockConnector::new(Source::Okta)));

        let order: Vec<Source> = registry.iter().map(|c| c.source()).collect();
        assert_eq!(order, Source::ALL.to_vec());
    }

    #[test]
    fn registering_twice_replaces() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(MockConnector::new(Source::Okta)));
        registry.register(Arc::new(MockConnector::new(Source::Okta)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn blank_queries_are_contract_violations() {
        let err = validate_query("   ").unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(validate_query(" jane ").unwrap(), "jane");
    }
}
