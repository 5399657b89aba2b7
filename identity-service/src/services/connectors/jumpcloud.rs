use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use service_core::observability::TracedClientExt;

use super::http::{build_client, ensure_success, join_url, path_segment};
use super::{validate_id, validate_query, ConnectorError, DirectoryConnector};
use crate::config::JumpCloudConfig;
use crate::models::{
    AccountSource, Attributes, MfaDevice, MfaStatus, RecordType, SearchResult, Source, UserPatch,
};

const API_KEY_HEADER: &str = "x-api-key";
const SEARCH_FIELDS: [&str; 4] = ["email", "username", "firstname", "lastname"];

/// JumpCloud system-user directory.
pub struct JumpCloudConnector {
    config: JumpCloudConfig,
    client: Client,
}

// JumpCloud sends explicit nulls for unset profile fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SystemUser {
    #[serde(rename = "_id")]
    id: String,
    username: Option<String>,
    email: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    displayname: Option<String>,
    activated: Option<bool>,
    suspended: Option<bool>,
    account_locked: Option<bool>,
    password_date: Option<String>,
    password_expiration_date: Option<String>,
    totp_enabled: Option<bool>,
    mfa: Option<MfaSettings>,
    #[serde(rename = "mfaEnrollment")]
    mfa_enrollment: Option<MfaEnrollment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MfaSettings {
    configured: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MfaEnrollment {
    totp_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PushEndpoint {
    id: String,
    name: Option<String>,
    state: Option<String>,
    enrollment_date: Option<String>,
    last_used_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListResponse {
    results: Vec<Value>,
}

impl JumpCloudConnector {
    pub fn new(config: JumpCloudConfig) -> Result<Self, ConnectorError> {
        let client = build_client(config.timeout())?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    /// URL under `/api/systemusers/{id}` with the id kept to one path segment.
    fn user_url(&self, id: &str, suffix: &str) -> Result<String, ConnectorError> {
        Ok(self.url(&format!("/api/systemusers/{}{}", path_segment(id)?, suffix)))
    }

    fn ensure_enabled(&self) -> Result<(), ConnectorError> {
        if !self.config.enabled {
            return Err(ConnectorError::NotEnabled(
                "JumpCloud connector is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Fetch the raw system user, by object id or else by exact username.
    async fn fetch_user(&self, id: &str) -> Result<Option<Value>, ConnectorError> {
        if !is_object_id(id) {
            return self.fetch_user_by_username(id).await;
        }

        let response = self
            .client
            .traced_get(&self.user_url(id, "")?)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            return Ok(None);
        }

        let response = ensure_success(response, "JumpCloud get user").await?;
        let user: Value = response.json().await?;
        Ok(Some(user))
    }

    async fn fetch_user_by_username(&self, username: &str) -> Result<Option<Value>, ConnectorError> {
        if !is_filter_literal(username) {
            tracing::debug!(username, "Not a JumpCloud username; skipping filter lookup");
            return Ok(None);
        }

        let filter = format!("username:$eq:{}", username);
        let response = self
            .client
            .traced_get(&self.url("/api/systemusers"))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .query(&[("filter", filter.as_str()), ("limit", "1")])
            .send()
            .await?;

        let response = ensure_success(response, "JumpCloud username lookup").await?;
        let list: ListResponse = response.json().await?;
        Ok(list.results.into_iter().next())
    }

    /// Issue a write and report whether the target existed.
    async fn write(
        &self,
        request: service_core::observability::TracedRequest,
        context: &str,
    ) -> Result<bool, ConnectorError> {
        let response = request
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(context, "JumpCloud user not found");
            return Ok(false);
        }

        ensure_success(response, context).await?;
        Ok(true)
    }
}

#[async_trait]
impl DirectoryConnector for JumpCloudConnector {
    fn source(&self) -> Source {
        Source::JumpCloud
    }

    #[tracing::instrument(skip(self))]
    async fn search_users(&self, query: &str) -> Result<Vec<SearchResult>, ConnectorError> {
        let query = validate_query(query)?;
        self.ensure_enabled()?;

        let body = json!({
            "searchFilter": {
                "searchTerm": query,
                "fields": SEARCH_FIELDS,
            },
            "limit": self.config.search_limit,
        });

        let response = self
            .client
            .traced_post(&self.url("/api/search/systemusers"))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, "JumpCloud search").await?;
        let list: ListResponse = response.json().await?;

        Ok(list
            .results
            .into_iter()
            .filter_map(|raw| match to_account(raw) {
                Ok(account) => Some(account.to_search_result()),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable JumpCloud user");
                    None
                }
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_id(&self, id: &str) -> Result<Option<AccountSource>, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        match self.fetch_user(id).await? {
            Some(raw) => Ok(Some(to_account(raw)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_mfa_devices(&self, id: &str) -> Result<Vec<MfaDevice>, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let Some(raw) = self.fetch_user(id).await? else {
            return Ok(Vec::new());
        };
        let user: SystemUser =
            serde_json::from_value(raw).map_err(|e| ConnectorError::Decode(e.to_string()))?;

        let mut devices = Vec::new();
        if let Some(device) = totp_device(&user) {
            devices.push(device);
        }

        let response = self
            .client
            .traced_get(&self.url(&format!(
                "/api/v2/users/{}/pushendpoints",
                path_segment(&user.id)?
            )))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        if response.status() != StatusCode::NOT_FOUND {
            let response = ensure_success(response, "JumpCloud push endpoints").await?;
            let endpoints: Vec<PushEndpoint> = response.json().await?;
            devices.extend(endpoints.into_iter().map(push_device));
        }

        Ok(devices)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let body = patch_body(patch);
        if body.is_empty() {
            return Err(ConnectorError::InvalidRequest(
                "Update contains no fields".to_string(),
            ));
        }

        let request = self
            .client
            .traced_put(&self.user_url(id, "")?)
            .json(&Value::Object(body));
        self.write(request, "JumpCloud update user").await
    }

    #[tracing::instrument(skip(self))]
    async fn expire_password(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let request = self
            .client
            .traced_post(&self.user_url(id, "/expire")?);
        self.write(request, "JumpCloud expire password").await
    }

    #[tracing::instrument(skip(self))]
    async fn reset_mfa(&self, id: &str, factor_id: Option<&str>) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        if let Some(factor_id) = factor_id {
            tracing::debug!(factor_id, "JumpCloud resets all factors; factor id ignored");
        }

        let request = self
            .client
            .traced_post(&self.user_url(id, "/resetmfa")?)
            .json(&json!({ "exclusion": false }));
        self.write(request, "JumpCloud reset MFA").await
    }

    #[tracing::instrument(skip(self))]
    async fn suspend(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let request = self
            .client
            .traced_put(&self.user_url(id, "")?)
            .json(&json!({ "suspended": true }));
        self.write(request, "JumpCloud suspend user").await
    }

    async fn health_check(&self) -> Result<(), ConnectorError> {
        self.ensure_enabled()?;

        let response = self
            .client
            .traced_get(&self.url("/api/systemusers"))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .query(&[("limit", "1")])
            .send()
            .await?;
        ensure_success(response, "JumpCloud health check").await?;
        Ok(())
    }
}

/// JumpCloud object ids are 24 hex characters.
fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Usernames that can be embedded in a `field:$eq:value` filter verbatim.
fn is_filter_literal(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '+'))
}

fn to_account(raw: Value) -> Result<AccountSource, ConnectorError> {
    let user: SystemUser =
        serde_json::from_value(raw.clone()).map_err(|e| ConnectorError::Decode(e.to_string()))?;
    let attributes: Attributes = match raw {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let first_name = user.firstname.clone().unwrap_or_default();
    let last_name = user.lastname.clone().unwrap_or_default();
    let display_name = match user.displayname.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{} {}", first_name, last_name).trim().to_string(),
    };

    Ok(AccountSource {
        source: Source::JumpCloud,
        source_id: user.id.clone(),
        username: user.username.clone().unwrap_or_default(),
        email: user.email.clone().unwrap_or_default(),
        first_name,
        last_name,
        display_name,
        enabled: user.activated.unwrap_or(false) && !user.suspended.unwrap_or(false),
        locked: user.account_locked.unwrap_or(false),
        password_last_set: user.password_date.as_deref().and_then(parse_timestamp),
        password_expiry_date: user
            .password_expiration_date
            .as_deref()
            .and_then(parse_timestamp),
        last_login: None,
        mfa_enabled: user.totp_enabled.unwrap_or(false)
            || user.mfa.as_ref().and_then(|m| m.configured).unwrap_or(false),
        attributes,
    })
}

fn totp_device(user: &SystemUser) -> Option<MfaDevice> {
    let status = match user
        .mfa_enrollment
        .as_ref()
        .and_then(|e| e.totp_status.as_deref())
    {
        Some("ENROLLED") => MfaStatus::Active,
        Some("PENDING_ACTIVATION") | Some("IN_ENROLLMENT") => MfaStatus::Pending,
        _ if user.totp_enabled.unwrap_or(false) => MfaStatus::Active,
        _ => return None,
    };

    Some(MfaDevice {
        id: format!("{}-totp", user.id),
        device_type: "totp".to_string(),
        name: "TOTP authenticator".to_string(),
        status,
        enrolled_at: None,
        last_used: None,
        source: Source::JumpCloud,
    })
}

fn push_device(endpoint: PushEndpoint) -> MfaDevice {
    let state = endpoint.state.unwrap_or_default().to_ascii_lowercase();
    let status = match state.as_str() {
        "active" => MfaStatus::Active,
        "pending" => MfaStatus::Pending,
        _ => MfaStatus::Inactive,
    };

    MfaDevice {
        id: endpoint.id,
        device_type: "push".to_string(),
        name: endpoint
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Push device".to_string()),
        status,
        enrolled_at: endpoint.enrollment_date.as_deref().and_then(parse_timestamp),
        last_used: endpoint.last_used_date.as_deref().and_then(parse_timestamp),
        source: Source::JumpCloud,
    }
}

fn patch_body(patch: &UserPatch) -> Map<String, Value> {
    let mut body = Map::new();
    let fields = [
        ("firstname", &patch.first_name),
        ("lastname", &patch.last_name),
        ("displayname", &patch.display_name),
        ("email", &patch.email),
        ("username", &patch.username),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            body.insert(name.to_string(), Value::String(value.clone()));
        }
    }
    body
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
