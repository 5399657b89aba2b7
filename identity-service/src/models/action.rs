use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Update,
    ExpirePassword,
    #[serde(alias = "resetMFA")]
    ResetMfa,
    Suspend,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Update => "update",
            ActionKind::ExpirePassword => "expirePassword",
            ActionKind::ResetMfa => "resetMfa",
            ActionKind::Suspend => "suspend",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field changes for the `update` action. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Username must not be empty"))]
    pub username: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.display_name.is_none()
            && self.email.is_none()
            && self.username.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetMfaPayload {
    #[serde(default, alias = "factor")]
    factor_id: Option<String>,
}

/// A write operation against exactly one account in one source.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountAction {
    Update(UserPatch),
    ExpirePassword,
    ResetMfa { factor_id: Option<String> },
    Suspend,
}

impl AccountAction {
    /// Build a typed action from its wire form.
    pub fn from_parts(kind: ActionKind, payload: Option<Value>) -> Result<Self, serde_json::Error> {
        match kind {
            ActionKind::Update => {
                let patch: UserPatch = serde_json::from_value(payload.unwrap_or(Value::Null))?;
                Ok(AccountAction::Update(patch))
            }
            ActionKind::ExpirePassword => Ok(AccountAction::ExpirePassword),
            ActionKind::ResetMfa => {
                let payload = match payload {
                    Some(Value::Null) | None => ResetMfaPayload::default(),
                    Some(value) => serde_json::from_value(value)?,
                };
                Ok(AccountAction::ResetMfa {
                    factor_id: payload.factor_id,
                })
            }
            ActionKind::Suspend => Ok(AccountAction::Suspend),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            AccountAction::Update(_) => ActionKind::Update,
            AccountAction::ExpirePassword => ActionKind::ExpirePassword,
            AccountAction::ResetMfa { .. } => ActionKind::ResetMfa,
            AccountAction::Suspend => ActionKind::Suspend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_legacy_reset_mfa_spelling() {
        let kind: ActionKind = serde_json::from_value(json!("resetMFA")).unwrap();
        assert_eq!(kind, ActionKind::ResetMfa);
        let kind: ActionKind = serde_json::from_value(json!("resetMfa")).unwrap();
        assert_eq!(kind, ActionKind::ResetMfa);
    }

    #[test]
    fn update_requires_payload() {
        assert!(AccountAction::from_parts(ActionKind::Update, None).is_err());

        let action = AccountAction::from_parts(
            ActionKind::Update,
            Some(json!({ "firstName": "Jane", "email": "jane@x.com" })),
        )
        .unwrap();
        match action {
            AccountAction::Update(patch) => {
                assert_eq!(patch.first_name.as_deref(), Some("Jane"));
                assert_eq!(patch.email.as_deref(), Some("jane@x.com"));
                assert!(patch.last_name.is_none());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn reset_mfa_payload_is_optional() {
        assert_eq!(
            AccountAction::from_parts(ActionKind::ResetMfa, None).unwrap(),
            AccountAction::ResetMfa { factor_id: None }
        );
        assert_eq!(
            AccountAction::from_parts(ActionKind::ResetMfa, Some(json!({ "factor": "f-1" })))
                .unwrap(),
            AccountAction::ResetMfa {
                factor_id: Some("f-1".to_string())
            }
        );
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(UserPatch::default().is_empty());
        let patch = UserPatch {
            display_name: Some("Jane Doe".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
