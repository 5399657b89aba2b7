use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{validate_id, validate_query, ConnectorError, DirectoryConnector};
use crate::models::{AccountSource, MfaDevice, MfaStatus, SearchResult, Source, UserPatch};

/// Operation groups whose failure can be switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Search,
    Lookup,
    Mfa,
    Actions,
    Health,
}

/// In-memory connector for tests and local development
pub struct MockConnector {
    source: Source,
    users: Vec<AccountSource>,
    stray_hits: Vec<SearchResult>,
    devices: HashMap<String, Vec<MfaDevice>>,
    failing: HashSet<MockOperation>,
    call_count: AtomicU64,
    actions: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            users: Vec::new(),
            stray_hits: Vec::new(),
            devices: HashMap::new(),
            failing: HashSet::new(),
            call_count: AtomicU64::new(0),
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_user(mut self, user: AccountSource) -> Self {
        self.users.push(user);
        self
    }

    /// A search hit with no account behind it, such as a group or a stale
    /// index entry. Returned ahead of matching users.
    pub fn with_search_hit(mut self, hit: SearchResult) -> Self {
        self.stray_hits.push(hit);
        self
    }

    pub fn with_devices(mut self, id: &str, devices: Vec<MfaDevice>) -> Self {
        self.devices.insert(id.to_string(), devices);
        self
    }

    pub fn failing(mut self, operation: MockOperation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Number of connector calls received, health checks included.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Dispatched actions as `"<action>:<id>"`, in order.
    pub fn actions(&self) -> Vec<String> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    /// A connector pre-loaded with a small shared population so the three
    /// sources correlate on email.
    pub fn demo(source: Source) -> Self {
        let (jane_id, john_id) = match source {
            Source::JumpCloud => ("5f1b2c3d4e5f6a7b8c9d0e1f", "5f1b2c3d4e5f6a7b8c9d0e2a"),
            Source::Okta => ("00u1janedoe", "00u1johnroe"),
            Source::ActiveDirectory => (
                "CN=Jane Doe,OU=Staff,DC=corp,DC=local",
                "CN=John Roe,OU=Staff,DC=corp,DC=local",
            ),
        };

        let mut connector = Self::new(source)
            .with_user(demo_user(source, jane_id, "jdoe", "jane@x.com", "Jane", "Doe"))
            .with_user(demo_user(source, john_id, "jroe", "john@x.com", "John", "Roe"));

        if source != Source::ActiveDirectory {
            connector = connector.with_devices(
                jane_id,
                vec![MfaDevice {
                    id: format!("{}-totp", source),
                    device_type: "totp".to_string(),
                    name: "Authenticator app".to_string(),
                    status: MfaStatus::Active,
                    enrolled_at: None,
                    last_used: None,
                    source,
                }],
            );
        }
        connector
    }

    fn check(&self, operation: MockOperation) -> Result<(), ConnectorError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&operation) {
            return Err(ConnectorError::Connection(format!(
                "[MOCK] {} unavailable",
                self.source
            )));
        }
        Ok(())
    }

    fn find(&self, id: &str) -> Option<&AccountSource> {
        self.users.iter().find(|user| {
            user.source_id == id || user.username.eq_ignore_ascii_case(id)
        })
    }

    fn act(&self, action: &str, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.check(MockOperation::Actions)?;

        let Some(user) = self.find(id) else {
            return Ok(false);
        };

        tracing::info!(source = %self.source, action, id = %user.source_id, "[MOCK] Action would be applied");
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(format!("{}:{}", action, user.source_id));
        }
        Ok(true)
    }
}

#[async_trait]
impl DirectoryConnector for MockConnector {
    fn source(&self) -> Source {
        self.source
    }

    async fn search_users(&self, query: &str) -> Result<Vec<SearchResult>, ConnectorError> {
        let query = validate_query(query)?.to_lowercase();
        self.check(MockOperation::Search)?;

        let users = self.users.iter().map(AccountSource::to_search_result);
        Ok(self
            .stray_hits
            .iter()
            .cloned()
            .chain(users)
            .filter(|hit| {
                [hit.email.as_deref(), hit.username.as_deref(), Some(hit.display_name.as_str())]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<AccountSource>, ConnectorError> {
        let id = validate_id(id)?;
        self.check(MockOperation::Lookup)?;
        Ok(self.find(id).cloned())
    }

    async fn get_mfa_devices(&self, id: &str) -> Result<Vec<MfaDevice>, ConnectorError> {
        let id = validate_id(id)?;
        self.check(MockOperation::Mfa)?;
        Ok(self.devices.get(id).cloned().unwrap_or_default())
    }

    async fn update_user(&self, id: &str, _patch: &UserPatch) -> Result<bool, ConnectorError> {
        self.act("update", id)
    }

    async fn expire_password(&self, id: &str) -> Result<bool, ConnectorError> {
        self.act("expirePassword", id)
    }

    async fn reset_mfa(&self, id: &str, _factor_id: Option<&str>) -> Result<bool, ConnectorError> {
        self.act("resetMfa", id)
    }

    async fn suspend(&self, id: &str) -> Result<bool, ConnectorError> {
        self.act("suspend", id)
    }

    async fn health_check(&self) -> Result<(), ConnectorError> {
        self.check(MockOperation::Health)
    }
}

/// Build a plain enabled account for the mock population.
pub fn demo_user(
    source: Source,
    id: &str,
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> AccountSource {
    AccountSource {
        source,
        source_id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        display_name: format!("{} {}", first_name, last_name),
        enabled: true,
        locked: false,
        password_last_set: None,
        password_expiry_date: None,
        last_login: None,
        mfa_enabled: false,
        attributes: Default::default(),
    }
}
