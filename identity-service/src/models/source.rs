use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Directory backend a record originates from.
///
/// Declaration order is the canonical lookup order used when no source hint
/// is supplied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    #[serde(rename = "jumpcloud")]
    JumpCloud,
    #[serde(rename = "okta")]
    Okta,
    #[serde(rename = "active-directory")]
    ActiveDirectory,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::JumpCloud, Source::Okta, Source::ActiveDirectory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::JumpCloud => "jumpcloud",
            Source::Okta => "okta",
            Source::ActiveDirectory => "active-directory",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jumpcloud" => Ok(Source::JumpCloud),
            "okta" => Ok(Source::Okta),
            "active-directory" | "activedirectory" | "ad" => Ok(Source::ActiveDirectory),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}
