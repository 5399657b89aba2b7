use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use service_core::observability::{TracedClientExt, TracedRequest};

use super::http::{build_client, ensure_success, join_url, path_segment};
use super::{validate_id, validate_query, ConnectorError, DirectoryConnector};
use crate::config::OktaConfig;
use crate::models::{
    AccountSource, Attributes, MfaDevice, MfaStatus, SearchResult, Source, UserPatch,
};

/// Okta Users and Factors API.
pub struct OktaConnector {
    config: OktaConfig,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OktaUser {
    id: String,
    status: String,
    status_changed: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    password_changed: Option<DateTime<Utc>>,
    profile: OktaProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OktaProfile {
    login: String,
    email: String,
    first_name: String,
    last_name: String,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OktaFactor {
    id: String,
    factor_type: String,
    provider: String,
    status: String,
    created: Option<DateTime<Utc>>,
    last_verified: Option<DateTime<Utc>>,
    profile: Map<String, Value>,
}

impl OktaConnector {
    pub fn new(config: OktaConfig) -> Result<Self, ConnectorError> {
        if config.enabled && config.org_url.is_empty() {
            return Err(ConnectorError::Configuration(
                "Okta org URL is not configured".to_string(),
            ));
        }
        let client = build_client(config.timeout())?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.org_url, path)
    }

    /// URL under `/api/v1/users/{id}` with the id kept to one path segment.
    fn user_url(&self, id: &str, suffix: &str) -> Result<String, ConnectorError> {
        Ok(self.url(&format!("/api/v1/users/{}{}", path_segment(id)?, suffix)))
    }

    fn authorize(&self, request: TracedRequest) -> TracedRequest {
        request
            .header(
                "Authorization",
                &format!("SSWS {}", self.config.api_token.expose_secret()),
            )
            .header("Accept", "application/json")
    }

    fn ensure_enabled(&self) -> Result<(), ConnectorError> {
        if !self.config.enabled {
            return Err(ConnectorError::NotEnabled(
                "Okta connector is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_factors(&self, id: &str) -> Result<Option<Vec<OktaFactor>>, ConnectorError> {
        let response = self
            .authorize(self.client.traced_get(&self.user_url(id, "/factors")?))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "Okta list factors").await?;
        Ok(Some(response.json().await?))
    }

    async fn write(&self, request: TracedRequest, context: &str) -> Result<bool, ConnectorError> {
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(context, "Okta user or factor not found");
            return Ok(false);
        }

        ensure_success(response, context).await?;
        Ok(true)
    }
}

#[async_trait]
impl DirectoryConnector for OktaConnector {
    fn source(&self) -> Source {
        Source::Okta
    }

    #[tracing::instrument(skip(self))]
    async fn search_users(&self, query: &str) -> Result<Vec<SearchResult>, ConnectorError> {
        let query = validate_query(query)?;
        self.ensure_enabled()?;

        let limit = self.config.search_limit.to_string();
        let response = self
            .authorize(self.client.traced_get(&self.url("/api/v1/users")))
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        let response = ensure_success(response, "Okta search").await?;
        let users: Vec<Value> = response.json().await?;

        Ok(users
            .into_iter()
            .filter_map(|raw| match to_account(raw, false) {
                Ok(account) => Some(account.to_search_result()),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable Okta user");
                    None
                }
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_id(&self, id: &str) -> Result<Option<AccountSource>, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let response = self
            .authorize(self.client.traced_get(&self.user_url(id, "")?))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "Okta get user").await?;
        let raw: Value = response.json().await?;

        let user_id = raw
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        let mfa_enabled = match self.list_factors(&user_id).await {
            Ok(factors) => factors
                .unwrap_or_default()
                .iter()
                .any(|f| f.status == "ACTIVE"),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read Okta factors");
                false
            }
        };

        Ok(Some(to_account(raw, mfa_enabled)?))
    }

    #[tracing::instrument(skip(self))]
    async fn get_mfa_devices(&self, id: &str) -> Result<Vec<MfaDevice>, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let factors = self.list_factors(id).await?.unwrap_or_default();
        Ok(factors.into_iter().map(to_device).collect())
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let profile = profile_patch(patch);
        if profile.is_empty() {
            return Err(ConnectorError::InvalidRequest(
                "Update contains no fields".to_string(),
            ));
        }

        // POST performs a partial profile update; PUT would replace it.
        let request = self
            .client
            .traced_post(&self.user_url(id, "")?)
            .json(&json!({ "profile": profile }));
        self.write(request, "Okta update user").await
    }

    #[tracing::instrument(skip(self))]
    async fn expire_password(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let request = self
            .client
            .traced_post(&self.user_url(id, "/lifecycle/expire_password")?);
        self.write(request, "Okta expire password").await
    }

    #[tracing::instrument(skip(self))]
    async fn reset_mfa(&self, id: &str, factor_id: Option<&str>) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let request = match factor_id {
            Some(factor_id) => {
                let suffix = format!("/factors/{}", path_segment(factor_id)?);
                self.client.traced_delete(&self.user_url(id, &suffix)?)
            }
            None => self
                .client
                .traced_post(&self.user_url(id, "/lifecycle/reset_factors")?),
        };
        self.write(request, "Okta reset MFA").await
    }

    #[tracing::instrument(skip(self))]
    async fn suspend(&self, id: &str) -> Result<bool, ConnectorError> {
        let id = validate_id(id)?;
        self.ensure_enabled()?;

        let request = self
            .client
            .traced_post(&self.user_url(id, "/lifecycle/suspend")?);
        self.write(request, "Okta suspend user").await
    }

    async fn health_check(&self) -> Result<(), ConnectorError> {
        self.ensure_enabled()?;

        let response = self
            .authorize(self.client.traced_get(&self.url("/api/v1/users")))
            .query(&[("limit", "1")])
            .send()
            .await?;
        ensure_success(response, "Okta health check").await?;
        Ok(())
    }
}

fn to_account(raw: Value, mfa_enabled: bool) -> Result<AccountSource, ConnectorError> {
    let user: OktaUser =
        serde_json::from_value(raw.clone()).map_err(|e| ConnectorError::Decode(e.to_string()))?;
    let attributes: Attributes = match raw {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let profile = user.profile;
    let display_name = profile
        .display_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            format!("{} {}", profile.first_name, profile.last_name)
                .trim()
                .to_string()
        });

    let (enabled, locked) = match user.status.as_str() {
        "SUSPENDED" | "DEPROVISIONED" => (false, false),
        "LOCKED_OUT" => (true, true),
        _ => (true, false),
    };
    let password_expiry_date = if user.status == "PASSWORD_EXPIRED" {
        user.status_changed
    } else {
        None
    };

    Ok(AccountSource {
        source: Source::Okta,
        source_id: user.id,
        username: profile.login,
        email: profile.email,
        first_name: profile.first_name,
        last_name: profile.last_name,
        display_name,
        enabled,
        locked,
        password_last_set: user.password_changed,
        password_expiry_date,
        last_login: user.last_login,
        mfa_enabled,
        attributes,
    })
}

fn to_device(factor: OktaFactor) -> MfaDevice {
    let status = match factor.status.as_str() {
        "ACTIVE" => MfaStatus::Active,
        "PENDING_ACTIVATION" => MfaStatus::Pending,
        _ => MfaStatus::Inactive,
    };

    let name = ["name", "credentialId", "phoneNumber", "email"]
        .iter()
        .find_map(|key| factor.profile.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", factor.provider, factor.factor_type));

    MfaDevice {
        id: factor.id,
        device_type: factor.factor_type,
        name,
        status,
        enrolled_at: factor.created,
        last_used: factor.last_verified,
        source: Source::Okta,
    }
}

fn profile_patch(patch: &UserPatch) -> Map<String, Value> {
    let mut profile = Map::new();
    let fields = [
        ("firstName", &patch.first_name),
        ("lastName", &patch.last_name),
        ("displayName", &patch.display_name),
        ("email", &patch.email),
        ("login", &patch.username),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            profile.insert(name.to_string(), Value::String(value.clone()));
        }
    }
    profile
}
