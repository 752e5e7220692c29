use crate::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use visor_cache::{privileges_cache_key, Cache, PRIVILEGES_PATTERN};
use visor_database::Database;
use visor_models::{Policy, PolicyEffect};

/// Seconds a user's effective policies stay cached
const PRIVILEGES_TTL_SECONDS: u64 = 60;

pub mod resources {
    pub const USERS: &str = "users";
    pub const ROLES: &str = "roles";
    pub const POLICIES: &str = "policies";
    pub const INVITATIONS: &str = "invitations";
    pub const PROFILE: &str = "profile";
}

pub mod actions {
    pub const READ: &str = "read";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub allowed: bool,
    pub reason: String,
    /// Policy that decided the outcome, if any matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// Everything a user can do, as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeSummary {
    pub user_id: Uuid,
    pub policies: Vec<Policy>,
}

/// Deny-overrides evaluation of `action` on `resource`
pub fn evaluate(policies: &[Policy], resource: &str, action: &str) -> CheckResponse {
    let mut allowed_by = None;

    for policy in policies.iter().filter(|p| p.matches(resource, action)) {
        match policy.effect {
            PolicyEffect::Deny => {
                return CheckResponse {
                    allowed: false,
                    reason: format!("Denied by policy '{}'", policy.name),
                    policy: Some(policy.name.clone()),
                };
            }
            PolicyEffect::Allow => {
                allowed_by.get_or_insert(policy);
            }
        }
    }

    match allowed_by {
        Some(policy) => CheckResponse {
            allowed: true,
            reason: format!("Allowed by policy '{}'", policy.name),
            policy: Some(policy.name.clone()),
        },
        None => CheckResponse {
            allowed: false,
            reason: format!("No policy grants '{}' on '{}'", action, resource),
            policy: None,
        },
    }
}

#[derive(Clone)]
pub struct PrivilegeService {
    db: Database,
    cache: Cache,
}

impl PrivilegeService {
    pub fn new(db: Database, cache: Cache) -> Self {
        Self { db, cache }
    }

    /// Union of the policies attached to the user's roles
    pub async fn effective_policies(&self, user_id: Uuid) -> Result<Vec<Policy>> {
        let cache_key = privileges_cache_key(&user_id.to_string());

        match self.cache.get::<Vec<Policy>>(&cache_key).await {
            Ok(Some(policies)) => return Ok(policies),
            Ok(None) => {}
            Err(e) => tracing::warn!("Privilege cache read failed: {}", e),
        }

        let policies = self.db.policies().get_user_policies(user_id).await?;

        if let Err(e) = self
            .cache
            .set(&cache_key, &policies, Some(PRIVILEGES_TTL_SECONDS))
            .await
        {
            tracing::warn!("Privilege cache write failed: {}", e);
        }

        Ok(policies)
    }

    pub async fn check(&self, user_id: Uuid, resource: &str, action: &str) -> Result<CheckResponse> {
        let policies = self.effective_policies(user_id).await?;
        let response = evaluate(&policies, resource, action);

        tracing::debug!(
            user_id = %user_id,
            resource,
            action,
            allowed = response.allowed,
            "Privilege check"
        );

        Ok(response)
    }

    /// Fails with `PermissionDenied` unless the check allows
    pub async fn ensure(&self, user_id: Uuid, resource: &str, action: &str) -> Result<()> {
        let response = self.check(user_id, resource, action).await?;
        if response.allowed {
            Ok(())
        } else {
            Err(crate::AuthzError::PermissionDenied(response.reason))
        }
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<PrivilegeSummary> {
        Ok(PrivilegeSummary {
            user_id,
            policies: self.effective_policies(user_id).await?,
        })
    }

    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<()> {
        self.cache
            .delete(&privileges_cache_key(&user_id.to_string()))
            .await?;
        Ok(())
    }

    /// Drop every cached privilege set. Used when a change can affect any
    /// number of users.
    pub async fn invalidate_all(&self) -> Result<()> {
        let removed = self.cache.delete_pattern(PRIVILEGES_PATTERN).await?;
        tracing::debug!(removed, "Invalidated cached privileges");
        Ok(())
    }
}
