use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Matches every resource or every action
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Policy {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub effect: PolicyEffect,
    pub resource: String,
    pub actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Whether this policy speaks about `action` on `resource`
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        let resource_matches = self.resource == WILDCARD || self.resource == resource;
        let action_matches = self
            .actions
            .iter()
            .any(|a| a == WILDCARD || a == action);

        resource_matches && action_matches
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl std::fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyEffect::Allow => write!(f, "allow"),
            PolicyEffect::Deny => write!(f, "deny"),
        }
    }
}

impl std::str::FromStr for PolicyEffect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(PolicyEffect::Allow),
            "deny" => Ok(PolicyEffect::Deny),
            _ => Err(format!("Invalid policy effect: {}", s)),
        }
    }
}

// SQLx implementation for PolicyEffect
impl sqlx::Type<sqlx::Postgres> for PolicyEffect {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT")
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PolicyEffect {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for PolicyEffect {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = self.to_string();
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(s.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPolicy {
    #[validate(length(min = 1, max = 64), regex(path = *crate::NAME_REGEX))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub effect: PolicyEffect,

    #[validate(length(min = 1, max = 100), regex(path = *crate::PRIVILEGE_TOKEN_REGEX))]
    pub resource: String,

    pub actions: Vec<String>,
}

impl NewPolicy {
    /// Field validation plus the action list rules
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        check_actions(&self.actions)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePolicy {
    #[validate(length(min = 1, max = 64), regex(path = *crate::NAME_REGEX))]
    pub name: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub effect: Option<PolicyEffect>,

    #[validate(length(min = 1, max = 100), regex(path = *crate::PRIVILEGE_TOKEN_REGEX))]
    pub resource: Option<String>,

    pub actions: Option<Vec<String>>,
}

impl UpdatePolicy {
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        match &self.actions {
            Some(actions) => check_actions(actions),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePolicy {
    pub role_id: Uuid,
    pub policy_id: Uuid,
    pub created_at: DateTime<Utc>,
}

fn check_actions(actions: &[String]) -> Result<(), validator::ValidationErrors> {
    let code = if actions.is_empty() {
        "actions_empty"
    } else if actions
        .iter()
        .any(|a| a.len() > 64 || !crate::PRIVILEGE_TOKEN_REGEX.is_match(a))
    {
        "action_invalid"
    } else {
        return Ok(());
    };

    let mut errors = validator::ValidationErrors::new();
    errors.add("actions", ValidationError::new(code));
    Err(errors)
}
