use serde::{Deserialize, Serialize};

use super::{AccountSource, MfaDevice, SearchResult, Source};

/// Search hits from every source that share one deduplication key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSearchResult {
    pub key: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub matches: Vec<SearchResult>,
    pub sources: Vec<Source>,
}

/// Every linked per-source account of one person, side by side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedAccount {
    pub primary_source: Source,
    pub accounts: Vec<AccountSource>,
    pub mfa_devices: Vec<MfaDevice>,
}

impl UnifiedAccount {
    pub fn account(&self, source: Source) -> Option<&AccountSource> {
        self.accounts.iter().find(|a| a.source == source)
    }

    pub fn sources(&self) -> Vec<Source> {
        self.accounts.iter().map(|a| a.source).collect()
    }
}
