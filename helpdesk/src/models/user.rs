//! Users and sessions

use super::{Resource, ResourceKind};
use crate::auth::role::RoleKey;
use crate::forms::{FieldSpec, FormSchema, Rule, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// Display name of the user's role
    pub role: String,
    /// Stable role identifier, when the backend sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<i64>,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role_key(&self) -> RoleKey {
        RoleKey {
            id: self.role_id,
            name: self.role.clone(),
        }
    }
}

/// The authenticated user and their bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Credentials submitted to the login endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// One-time code when the account has two-factor enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Create/edit payload for a user
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    /// Required on create, omitted on edit to keep the current password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<i64>,
}

pub const USER_SCHEMA: FormSchema = FormSchema {
    entity: "user",
    fields: &[
        FieldSpec {
            name: "name",
            label: "Name",
            rules: &[Rule::Required, Rule::MaxLength(100)],
        },
        FieldSpec {
            name: "email",
            label: "Email",
            rules: &[Rule::Required, Rule::Email, Rule::MaxLength(255)],
        },
        FieldSpec {
            name: "password",
            label: "Password",
            rules: &[Rule::MinLength(8), Rule::MaxLength(128)],
        },
        FieldSpec {
            name: "role_id",
            label: "Role",
            rules: &[Rule::Required, Rule::PositiveId],
        },
        FieldSpec {
            name: "floor_id",
            label: "Floor",
            rules: &[Rule::PositiveId],
        },
        FieldSpec {
            name: "area_id",
            label: "Area",
            rules: &[Rule::PositiveId],
        },
    ],
};

impl Resource for User {
    const KIND: ResourceKind = ResourceKind::Users;

    type Draft = UserDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &UserDraft) -> Result<(), ValidationErrors> {
        USER_SCHEMA.validate(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_parses_minimal_login_payload() {
        let json = r#"{"id": 7, "email": "ana@mefasa.com", "name": "Ana", "role": "Tecnico"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user.id, 7);
        assert_eq!(user.role, "Tecnico");
        assert!(user.role_id.is_none());
        assert!(!user.two_factor_enabled);
        assert_eq!(user.role_key().name, "Tecnico");
    }

    #[test]
    fn test_user_draft_validation() {
        let draft = UserDraft {
            name: "Ana".to_string(),
            email: "ana@mefasa.com".to_string(),
            password: Some("short".to_string()),
            role_id: 2,
            ..UserDraft::default()
        };
        let errors = User::validate(&draft).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.for_field("password").is_some());

        let edit = UserDraft {
            password: None,
            ..draft
        };
        assert!(User::validate(&edit).is_ok());
    }

    #[test]
    fn test_credentials_omit_absent_code() {
        let json = serde_json::to_value(Credentials::new("a@b.co", "pw")).unwrap();
        assert!(json.get("code").is_none());

        let json = serde_json::to_value(Credentials::new("a@b.co", "pw").with_code("123456")).unwrap();
        assert_eq!(json["code"], "123456");
    }
}
