use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_SEARCH_LIMIT: u32 = 25;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    /// Register in-memory connectors instead of the real backends.
    pub use_mock_connectors: bool,
    pub allowed_origins: Vec<String>,
    pub jumpcloud: JumpCloudConfig,
    pub okta: OktaConfig,
    pub active_directory: ActiveDirectoryConfig,
}

#[derive(Clone, Deserialize)]
pub struct JumpCloudConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout_secs: u64,
    pub search_limit: u32,
}

#[derive(Clone, Deserialize)]
pub struct OktaConfig {
    pub enabled: bool,
    /// Organisation URL, e.g. https://example.okta.com
    pub org_url: String,
    pub api_token: Secret<String>,
    pub timeout_secs: u64,
    pub search_limit: u32,
}

#[derive(Clone, Deserialize)]
pub struct ActiveDirectoryConfig {
    pub enabled: bool,
    /// ldap:// or ldaps:// URL of a domain controller.
    pub url: String,
    pub bind_dn: String,
    pub bind_password: Secret<String>,
    pub base_dn: String,
    pub use_starttls: bool,
    pub timeout_secs: u64,
    pub search_limit: u32,
}

impl JumpCloudConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OktaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ActiveDirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IdentityConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let jumpcloud_enabled = get_bool("JUMPCLOUD_ENABLED");
        let okta_enabled = get_bool("OKTA_ENABLED");
        let ad_enabled = get_bool("AD_ENABLED");

        Ok(IdentityConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            use_mock_connectors: get_bool("IDENTITY_MOCK_CONNECTORS"),
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            jumpcloud: JumpCloudConfig {
                enabled: jumpcloud_enabled,
                base_url: get_env(
                    "JUMPCLOUD_BASE_URL",
                    Some("https://console.jumpcloud.com"),
                    is_prod,
                )?,
                api_key: Secret::new(get_env(
                    "JUMPCLOUD_API_KEY",
                    Some(""),
                    is_prod && jumpcloud_enabled,
                )?),
                timeout_secs: get_parsed("JUMPCLOUD_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
                search_limit: get_parsed("JUMPCLOUD_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT),
            },
            okta: OktaConfig {
                enabled: okta_enabled,
                org_url: get_env("OKTA_ORG_URL", Some(""), is_prod && okta_enabled)?,
                api_token: Secret::new(get_env(
                    "OKTA_API_TOKEN",
                    Some(""),
                    is_prod && okta_enabled,
                )?),
                timeout_secs: get_parsed("OKTA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
                search_limit: get_parsed("OKTA_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT),
            },
            active_directory: ActiveDirectoryConfig {
                enabled: ad_enabled,
                url: get_env("AD_URL", Some("ldap://localhost:389"), is_prod && ad_enabled)?,
                bind_dn: get_env("AD_BIND_DN", Some(""), is_prod && ad_enabled)?,
                bind_password: Secret::new(get_env(
                    "AD_BIND_PASSWORD",
                    Some(""),
                    is_prod && ad_enabled,
                )?),
                base_dn: get_env("AD_BASE_DN", Some(""), is_prod && ad_enabled)?,
                use_starttls: get_bool("AD_USE_STARTTLS"),
                timeout_secs: get_parsed("AD_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
                search_limit: get_parsed("AD_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_bool(key: &str) -> bool {
    env::var(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

fn get_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
