use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Source;

/// Per-source payload carried through untouched.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    User,
    Group,
}

/// A single search hit returned by one connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub source: Source,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// The full record of one account in one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSource {
    pub source: Source,
    pub source_id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub enabled: bool,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_last_set: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl AccountSource {
    /// Condense the full record into the shape a search returns.
    pub fn to_search_result(&self) -> SearchResult {
        SearchResult {
            source: self.source,
            record_type: RecordType::User,
            id: self.source_id.clone(),
            display_name: self.display_name.clone(),
            email: non_empty(&self.email),
            username: non_empty(&self.username),
            attributes: self.attributes.clone(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
