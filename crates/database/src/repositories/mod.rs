use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use visor_models::{
    AssignRole, Invitation, NewInvitation, NewPasswordResetToken, NewPolicy, NewRole, NewSession,
    NewUser, PasswordResetToken, Policy, Role, Session, UpdatePolicy, UpdateRole, UpdateUser, User,
};

pub mod invitations;
pub mod password_resets;
pub mod policies;
pub mod roles;
pub mod sessions;
pub mod users;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new_user: &NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<User>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
    async fn count(&self) -> Result<i64>;
    async fn update(&self, id: Uuid, update: &UpdateUser) -> Result<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn update_last_login(&self, id: Uuid) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, new_role: &NewRole) -> Result<Role>;
    async fn find_by_id(&self, id: Uuid) -> Result<Role>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn list(&self) -> Result<Vec<Role>>;
    async fn update(&self, id: Uuid, update: &UpdateRole) -> Result<Role>;
    async fn delete(&self, id: Uuid) -> Result<()>;

    // User-Role Management
    async fn assign_to_user(&self, assignment: &AssignRole) -> Result<()>;
    /// Returns whether an assignment was removed
    async fn revoke_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;
    async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>>;

    // Role-Policy Management
    async fn attach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<()>;
    async fn detach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<bool>;
    async fn get_role_policies(&self, role_id: Uuid) -> Result<Vec<Policy>>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, new_policy: &NewPolicy) -> Result<Policy>;
    async fn find_by_id(&self, id: Uuid) -> Result<Policy>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Policy>>;
    async fn list(&self) -> Result<Vec<Policy>>;
    async fn update(&self, id: Uuid, update: &UpdatePolicy) -> Result<Policy>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Distinct policies reachable through any of the user's roles
    async fn get_user_policies(&self, user_id: Uuid) -> Result<Vec<Policy>>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create(&self, new_invitation: &NewInvitation) -> Result<Invitation>;
    async fn find_by_id(&self, id: Uuid) -> Result<Invitation>;
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>>;
    /// Most recent invitation for the email that is neither accepted,
    /// revoked nor expired
    async fn find_pending_by_email(&self, email: &str) -> Result<Option<Invitation>>;
    async fn list(&self) -> Result<Vec<Invitation>>;
    async fn mark_accepted(&self, id: Uuid) -> Result<()>;
    async fn revoke(&self, id: Uuid) -> Result<()>;
    async fn reissue(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, new_token: &NewPasswordResetToken) -> Result<PasswordResetToken>;
    /// Unused and unexpired token with this hash
    async fn find_valid(&self, token_hash: &str) -> Result<Option<PasswordResetToken>>;
    async fn mark_used(&self, id: Uuid) -> Result<()>;
    /// Marks every outstanding token of the user as used
    async fn invalidate_for_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, new_session: &NewSession) -> Result<Session>;
    /// Unexpired session issued for this refresh token
    async fn find_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Option<Session>>;
    /// Returns whether the session was still present
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn delete_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64>;
    async fn cleanup_expired(&self) -> Result<u64>;
}
