//! On-premises Active Directory over LDAP.
//!
//! Native identifiers are distinguished names. MFA is enforced by an external
//! system in front of the directory, so this connector reports no devices and
//! cannot reset factors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry, SearchOptions};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{validate_id, validate_query, ConnectorError, DirectoryConnector};
use crate::config::ActiveDirectoryConfig;
use crate::models::{
    AccountSource, Attributes, MfaDevice, RecordType, SearchResult, Source, UserPatch,
};

const UAC_ACCOUNTDISABLE: u32 = 0x2;
const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_NO_SUCH_OBJECT: u32 = 32;
/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

const USER_ATTRIBUTES: [&str; 17] = [
    "distinguishedName",
    "objectClass",
    "sAMAccountName",
    "userPrincipalName",
    "mail",
    "givenName",
    "sn",
    "displayName",
    "cn",
    "userAccountControl",
    "lockoutTime",
    "pwdLastSet",
    "lastLogonTimestamp",
    "msDS-UserPasswordExpiryTimeComputed",
    "department",
    "title",
    "memberOf",
];

pub struct ActiveDirectoryConnector {
    config: ActiveDirectoryConfig,
}

impl ActiveDirectoryConnector {
    pub fn new(config: ActiveDirectoryConfig) -> Result<Self, ConnectorError> {
        if config.enabled && config.base_dn.is_empty() {
            return Err(ConnectorError::Configuration(
                "Active Directory base DN is not configured".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn ensure_enabled(&self) -> Result<(), ConnectorError> {
        if !self.config.enabled {
            return Err(ConnectorError::NotEnabled(
                "Active Directory connector is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Open and bind a connection for a single operation.
    async fn connect(&self) -> Result<Ldap, ConnectorError> {
        self.ensure_enabled()?;

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout())
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| {
                ConnectorError::Connection(format!(
                    "Failed to connect to {}: {}",
                    self.config.url, e
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection driver error");
            }
        });

        let result = ldap
            .with_timeout(self.config.timeout())
            .simple_bind(&self.config.bind_dn, self.config.bind_password.expose_secret())
            .await
            .map_err(|e| ConnectorError::Connection(format!("LDAP bind failed: {}", e)))?;

        match result.rc {
            RC_SUCCESS => Ok(ldap),
            RC_INVALID_CREDENTIALS => Err(ConnectorError::Authentication(format!(
                "Invalid credentials for {}",
                self.config.bind_dn
            ))),
            rc => Err(ConnectorError::Connection(format!(
                "LDAP bind failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn release(&self, mut ldap: Ldap) {
        if let Err(e) = ldap.unbind().await {
            tracing::debug!(error = %e, "Error during LDAP unbind");
        }
    }

    async fn search(
        &self,
        ldap: &mut Ldap,
        base: &str,
        scope: Scope,
        filter: &str,
        size_limit: Option<u32>,
    ) -> Result<Vec<SearchEntry>, ConnectorError> {
        let mut options = SearchOptions::new();
        if let Some(limit) = size_limit {
            options = options.sizelimit(limit as i32);
        }

        let ldap3::SearchResult(entries, result) = ldap
            .with_search_options(options)
            .with_timeout(self.config.timeout())
            .search(base, scope, filter, USER_ATTRIBUTES.to_vec())
            .await
            .map_err(|e| ConnectorError::Connection(format!("LDAP search failed: {}", e)))?;

        match result.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => {
                Ok(entries.into_iter().map(SearchEntry::construct).collect())
            }
            RC_NO_SUCH_OBJECT => Ok(Vec::new()),
            rc => Err(ConnectorError::Api {
                status: rc as u16,
                message: format!("LDAP search failed: {}", result.text),
            }),
        }
    }

    async fn find_entry(&self, ldap: &mut Ldap, id: &str) -> Result<Option<SearchEntry>, ConnectorError> {
        let entries = if is_distinguished_name(id) {
            self.search(ldap, id, Scope::Base, "(objectClass=user)", None)
                .await?
        } else {
            let escaped = ldap_escape(id);
            let filter = format!(
                "(&(objectClass=user)(|(sAMAccountName={0})(userPrincipalName={0})))",
                escaped
            );
            self.search(ldap, &self.config.base_dn, Scope::Subtree, &filter, Some(1))
                .await?
        };
        Ok(entries.into_iter().next())
    }

    async fn modify(&self, ldap: &mut Ldap, id: &str, mods: Vec<Mod<String>>) -> Result<bool, ConnectorError> {
        let Some(entry) = self.find_entry(ldap, id).await? else {
            tracing::warn!(id, "Active Directory entry not found");
            return Ok(false);
        };

        let result = ldap
            .with_timeout(self.config.timeout())
            .modify(&entry.dn, mods)
            .await
            .map_err(|e| ConnectorError::Connection(format!("LDAP modify failed: {}", e)))?;

        match result.rc {
            RC_SUCCESS => Ok(true),
            RC_NO_SUCH_OBJECT => Ok(false),
            rc => Err(ConnectorError::Api {
                status: rc as u16,
                message: format!("LDAP modify failed for {}: {}", entry.dn, result.text),
            }),
        }
    }

    async fn with_connection_modify(&self, id: &str, mods: Vec<Mod<String>>) -> Result<bool, ConnectorError> {
        let mut ldap = self.connect().await?;
        let outcome = self.modify(&mut ldap, id, mods).await;
        self.release(ldap).await;
        outcome
    }
}

#[async_trait]
impl DirectoryConnector for ActiveDirectoryConnector {
    fn source(&self) -> Source {
        Source::ActiveDirectory
    }

    #[tracing::instrument(skip(self))]
    async fn search_users(&self, query: &str) -> Result<Vec<SearchResult>, ConnectorError> {
        let query = validate_query(query)?;
        let escaped = ldap_escape(query);
        let filter = format!(
            "(|(&(objectCategory=person)(objectClass=user)(|(sAMAccountName=*{0}*)(mail=*{0}*)(displayName=*{0}*)(cn=*{0}*)))(&(objectClass=group)(cn=*{0}*)))",
            escaped
        );

        let mut ldap = self.connect().await?;
        let entries = self
            .search(
                &mut ldap,
                &self.config.base_dn,
                Scope::Subtree,
                &filter,
                Some(self.config.search_limit),
            )
            .await;
        self.release(ldap).await;

        Ok(entries?.into_iter().map(entry_to_search_result).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_id(&self, id: &str) -> Result<Option<AccountSource>, ConnectorError> {
        let id = validate_id(id)?;

        let mut ldap = self.connect().await?;
        let entry = self.find_entry(&mut ldap, id).await;
        self.release(ldap).await;

        Ok(entry?.map(entry_to_account))
    }

    async fn get_mfa_devices(&self, id: &str) -> Result<Vec<MfaDevice>, ConnectorError> {
        validate_id(id)?;
        Ok(Vec::new())
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        let mods = patch_mods(patch);
        if mods.is_empty() {
            return Err(ConnectorError::InvalidRequest(
                "Update contains no fields".to_string(),
            ));
        }
        self.with_connection_modify(id, mods).await
    }

    #[tracing::instrument(skip(self))]
    async fn expire_password(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        // pwdLastSet = 0 forces a change at next logon.
        let mods = vec![Mod::Replace(
            "pwdLastSet".to_string(),
            HashSet::from(["0".to_string()]),
        )];
        self.with_connection_modify(id, mods).await
    }

    async fn reset_mfa(&self, _id: &str, _factor_id: Option<&str>) -> Result<bool, ConnectorError> {
        Err(ConnectorError::Unsupported(
            "MFA for Active Directory accounts is managed outside the directory".to_string(),
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn suspend(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;

        let mut ldap = self.connect().await?;
        let outcome = match self.find_entry(&mut ldap, id).await {
            Ok(Some(entry)) => {
                let uac = attr(&entry, "userAccountControl")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0);
                let mods = vec![Mod::Replace(
                    "userAccountControl".to_string(),
                    HashSet::from([(uac | UAC_ACCOUNTDISABLE).to_string()]),
                )];
                self.modify(&mut ldap, &entry.dn, mods).await
            }
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        self.release(ldap).await;
        outcome
    }

    async fn health_check(&self) -> Result<(), ConnectorError> {
        let mut ldap = self.connect().await?;
        let result = ldap
            .with_timeout(self.config.timeout())
            .search(&self.config.base_dn, Scope::Base, "(objectClass=*)", vec!["dn"])
            .await
            .map_err(|e| ConnectorError::Connection(format!("LDAP health check failed: {}", e)));
        self.release(ldap).await;

        let ldap3::SearchResult(entries, res) = result?;
        if res.rc != RC_SUCCESS || entries.is_empty() {
            return Err(ConnectorError::Connection(format!(
                "Base DN '{}' not accessible: {}",
                self.config.base_dn, res.text
            )));
        }
        Ok(())
    }
}

fn is_distinguished_name(id: &str) -> bool {
    id.split(',')
        .next()
        .is_some_and(|rdn| rdn.contains('='))
}

fn attr<'a>(entry: &'a SearchEntry, name: &str) -> Option<&'a String> {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
}

fn attr_or_empty(entry: &SearchEntry, name: &str) -> String {
    attr(entry, name).cloned().unwrap_or_default()
}

fn has_object_class(entry: &SearchEntry, class: &str) -> bool {
    entry
        .attrs
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case("objectClass"))
        .flat_map(|(_, values)| values.iter())
        .any(|value| value.eq_ignore_ascii_case(class))
}

/// Convert a Windows FILETIME (100ns ticks since 1601) to UTC.
/// Zero and the "never" sentinel map to `None`.
pub(crate) fn filetime_to_utc(raw: &str) -> Option<DateTime<Utc>> {
    let ticks: i64 = raw.trim().parse().ok()?;
    if ticks <= 0 || ticks == i64::MAX {
        return None;
    }
    let secs = ticks / 10_000_000 - FILETIME_EPOCH_OFFSET_SECS;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn entry_attributes(entry: &SearchEntry) -> Attributes {
    let mut attributes = Map::new();
    attributes.insert("dn".to_string(), Value::String(entry.dn.clone()));
    for (key, values) in &entry.attrs {
        let value = match values.as_slice() {
            [single] => Value::String(single.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };
        attributes.insert(key.clone(), value);
    }
    attributes
}

fn entry_to_search_result(entry: SearchEntry) -> SearchResult {
    let record_type = if has_object_class(&entry, "group") {
        RecordType::Group
    } else {
        RecordType::User
    };
    let display_name = attr(&entry, "displayName")
        .or_else(|| attr(&entry, "cn"))
        .cloned()
        .unwrap_or_else(|| entry.dn.clone());

    SearchResult {
        source: Source::ActiveDirectory,
        record_type,
        id: entry.dn.clone(),
        display_name,
        email: attr(&entry, "mail").cloned(),
        username: attr(&entry, "sAMAccountName").cloned(),
        attributes: entry_attributes(&entry),
    }
}

fn entry_to_account(entry: SearchEntry) -> AccountSource {
    let uac = attr(&entry, "userAccountControl")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);
    let locked = attr(&entry, "lockoutTime")
        .and_then(|v| v.parse::<i64>().ok())
        .is_some_and(|t| t > 0);

    let first_name = attr_or_empty(&entry, "givenName");
    let last_name = attr_or_empty(&entry, "sn");
    let display_name = attr(&entry, "displayName")
        .or_else(|| attr(&entry, "cn"))
        .cloned()
        .unwrap_or_else(|| format!("{} {}", first_name, last_name).trim().to_string());

    AccountSource {
        source: Source::ActiveDirectory,
        source_id: entry.dn.clone(),
        username: attr_or_empty(&entry, "sAMAccountName"),
        email: attr_or_empty(&entry, "mail"),
        first_name,
        last_name,
        display_name,
        enabled: uac & UAC_ACCOUNTDISABLE == 0,
        locked,
        password_last_set: attr(&entry, "pwdLastSet").and_then(|v| filetime_to_utc(v)),
        password_expiry_date: attr(&entry, "msDS-UserPasswordExpiryTimeComputed")
            .and_then(|v| filetime_to_utc(v)),
        last_login: attr(&entry, "lastLogonTimestamp").and_then(|v| filetime_to_utc(v)),
        mfa_enabled: false,
        attributes: entry_attributes(&entry),
    }
}

fn patch_mods(patch: &UserPatch) -> Vec<Mod<String>> {
    let fields = [
        ("givenName", &patch.first_name),
        ("sn", &patch.last_name),
        ("displayName", &patch.display_name),
        ("mail", &patch.email),
        ("sAMAccountName", &patch.username),
    ];
    fields
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| Mod::Replace(name.to_string(), HashSet::from([v.clone()])))
        })
        .collect()
}
