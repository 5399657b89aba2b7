use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Source;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MfaStatus {
    Active,
    Inactive,
    Pending,
}

impl std::fmt::Display for MfaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MfaStatus::Active => write!(f, "active"),
            MfaStatus::Inactive => write!(f, "inactive"),
            MfaStatus::Pending => write!(f, "pending"),
        }
    }
}

/// An enrolled second factor as reported by one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MfaDevice {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
    pub status: MfaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    pub source: Source,
}
