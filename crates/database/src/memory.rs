//! Process-local store backing every repository trait.
//!
//! Mirrors the relational constraints of the migrations: unique emails and
//! names, cascading deletes, and `ON CONFLICT DO NOTHING` link tables.

use crate::error::{DatabaseError, Result};
use crate::repositories::{
    InvitationRepository, PasswordResetRepository, PolicyRepository, RoleRepository,
    SessionRepository, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use visor_models::{
    AssignRole, Invitation, NewInvitation, NewPasswordResetToken, NewPolicy, NewRole, NewSession,
    NewUser, PasswordResetToken, Policy, Role, RolePolicy, Session, UpdatePolicy, UpdateRole,
    UpdateUser, User, UserRole,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    user_roles: Vec<UserRole>,
    policies: HashMap<Uuid, Policy>,
    role_policies: Vec<RolePolicy>,
    invitations: HashMap<Uuid, Invitation>,
    password_resets: HashMap<Uuid, PasswordResetToken>,
    sessions: HashMap<Uuid, Session>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn policy_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.policies
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn policies_of_role(&self, role_id: Uuid) -> Vec<Policy> {
        let mut policies: Vec<Policy> = self
            .role_policies
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| self.policies.get(&rp.policy_id).cloned())
            .collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        policies
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_name<T, F>(mut items: Vec<T>, name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new_user: &NewUser) -> Result<User> {
        let mut state = self.state.write().await;

        if state.email_taken(&new_user.email, None) {
            return Err(DatabaseError::duplicate("User", "this email"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            email_verified: new_user.email_verified,
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.email.cmp(&b.email)));

        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.read().await.users.len() as i64)
    }

    async fn update(&self, id: Uuid, update: &UpdateUser) -> Result<User> {
        let mut state = self.state.write().await;

        if let Some(ref email) = update.email {
            if state.email_taken(email, Some(id)) {
                return Err(DatabaseError::duplicate("User", "this email"));
            }
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        if let Some(ref email) = update.email {
            user.email = email.clone();
        }
        if let Some(ref first_name) = update.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(ref last_name) = update.last_name {
            user.last_name = Some(last_name.clone());
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        if !update.is_empty() {
            user.updated_at = Utc::now();
        }

        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        user.password_hash = Some(password_hash.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if state.users.remove(&id).is_none() {
            return Err(DatabaseError::not_found("User", &id.to_string()));
        }

        state.user_roles.retain(|ur| ur.user_id != id);
        state.sessions.retain(|_, s| s.user_id != id);
        state.password_resets.retain(|_, t| t.user_id != id);
        state.invitations.retain(|_, i| i.invited_by != id);
        for assignment in state.user_roles.iter_mut() {
            if assignment.granted_by == Some(id) {
                assignment.granted_by = None;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn create(&self, new_role: &NewRole) -> Result<Role> {
        let mut state = self.state.write().await;

        if state.role_name_taken(&new_role.name, None) {
            return Err(DatabaseError::duplicate("Role", "this name"));
        }

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: new_role.name.clone(),
            description: new_role.description.clone(),
            is_system: new_role.is_system,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());

        Ok(role)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Role> {
        self.state
            .read()
            .await
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let roles = self.state.read().await.roles.values().cloned().collect();
        Ok(sorted_by_name(roles, |r: &Role| r.name.as_str()))
    }

    async fn update(&self, id: Uuid, update: &UpdateRole) -> Result<Role> {
        let mut state = self.state.write().await;

        if let Some(ref name) = update.name {
            if state.role_name_taken(name, Some(id)) {
                return Err(DatabaseError::duplicate("Role", "this name"));
            }
        }

        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        if let Some(ref name) = update.name {
            role.name = name.clone();
        }
        if let Some(ref description) = update.description {
            role.description = Some(description.clone());
        }
        role.updated_at = Utc::now();

        Ok(role.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if state.roles.remove(&id).is_none() {
            return Err(DatabaseError::not_found("Role", &id.to_string()));
        }

        state.user_roles.retain(|ur| ur.role_id != id);
        state.role_policies.retain(|rp| rp.role_id != id);
        for invitation in state.invitations.values_mut() {
            if invitation.role_id == Some(id) {
                invitation.role_id = None;
            }
        }

        Ok(())
    }

    async fn assign_to_user(&self, assignment: &AssignRole) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&assignment.user_id)
            || !state.roles.contains_key(&assignment.role_id)
        {
            return Err(DatabaseError::ConstraintViolation(
                "user_roles references a missing user or role".to_string(),
            ));
        }

        let exists = state
            .user_roles
            .iter()
            .any(|ur| ur.user_id == assignment.user_id && ur.role_id == assignment.role_id);
        if !exists {
            state.user_roles.push(UserRole {
                user_id: assignment.user_id,
                role_id: assignment.role_id,
                granted_at: Utc::now(),
                granted_by: assignment.granted_by,
            });
        }

        Ok(())
    }

    async fn revoke_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.user_roles.len();
        state
            .user_roles
            .retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
        Ok(state.user_roles.len() != before)
    }

    async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        let roles = state
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| state.roles.get(&ur.role_id).cloned())
            .collect();
        Ok(sorted_by_name(roles, |r: &Role| r.name.as_str()))
    }

    async fn attach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.roles.contains_key(&role_id) || !state.policies.contains_key(&policy_id) {
            return Err(DatabaseError::ConstraintViolation(
                "role_policies references a missing role or policy".to_string(),
            ));
        }

        let exists = state
            .role_policies
            .iter()
            .any(|rp| rp.role_id == role_id && rp.policy_id == policy_id);
        if !exists {
            state.role_policies.push(RolePolicy {
                role_id,
                policy_id,
                created_at: Utc::now(),
            });
        }

        Ok(())
    }

    async fn detach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.role_policies.len();
        state
            .role_policies
            .retain(|rp| !(rp.role_id == role_id && rp.policy_id == policy_id));
        Ok(state.role_policies.len() != before)
    }

    async fn get_role_policies(&self, role_id: Uuid) -> Result<Vec<Policy>> {
        Ok(self.state.read().await.policies_of_role(role_id))
    }
}

#[async_trait]
impl PolicyRepository for MemoryStore {
    async fn create(&self, new_policy: &NewPolicy) -> Result<Policy> {
        let mut state = self.state.write().await;

        if state.policy_name_taken(&new_policy.name, None) {
            return Err(DatabaseError::duplicate("Policy", "this name"));
        }

        let now = Utc::now();
        let policy = Policy {
            id: Uuid::new_v4(),
            name: new_policy.name.clone(),
            description: new_policy.description.clone(),
            effect: new_policy.effect,
            resource: new_policy.resource.clone(),
            actions: new_policy.actions.clone(),
            created_at: now,
            updated_at: now,
        };
        state.policies.insert(policy.id, policy.clone());

        Ok(policy)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Policy> {
        self.state
            .read()
            .await
            .policies
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Policy", &id.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Policy>> {
        Ok(self
            .state
            .read()
            .await
            .policies
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Policy>> {
        let policies = self.state.read().await.policies.values().cloned().collect();
        Ok(sorted_by_name(policies, |p: &Policy| p.name.as_str()))
    }

    async fn update(&self, id: Uuid, update: &UpdatePolicy) -> Result<Policy> {
        let mut state = self.state.write().await;

        if let Some(ref name) = update.name {
            if state.policy_name_taken(name, Some(id)) {
                return Err(DatabaseError::duplicate("Policy", "this name"));
            }
        }

        let policy = state
            .policies
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Policy", &id.to_string()))?;

        if let Some(ref name) = update.name {
            policy.name = name.clone();
        }
        if let Some(ref description) = update.description {
            policy.description = Some(description.clone());
        }
        if let Some(effect) = update.effect {
            policy.effect = effect;
        }
        if let Some(ref resource) = update.resource {
            policy.resource = resource.clone();
        }
        if let Some(ref actions) = update.actions {
            policy.actions = actions.clone();
        }
        policy.updated_at = Utc::now();

        Ok(policy.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if state.policies.remove(&id).is_none() {
            return Err(DatabaseError::not_found("Policy", &id.to_string()));
        }
        state.role_policies.retain(|rp| rp.policy_id != id);

        Ok(())
    }

    async fn get_user_policies(&self, user_id: Uuid) -> Result<Vec<Policy>> {
        let state = self.state.read().await;

        let mut policies: Vec<Policy> = Vec::new();
        for assignment in state.user_roles.iter().filter(|ur| ur.user_id == user_id) {
            for policy in state.policies_of_role(assignment.role_id) {
                if !policies.iter().any(|p| p.id == policy.id) {
                    policies.push(policy);
                }
            }
        }

        Ok(sorted_by_name(policies, |p: &Policy| p.name.as_str()))
    }
}

#[async_trait]
impl InvitationRepository for MemoryStore {
    async fn create(&self, new_invitation: &NewInvitation) -> Result<Invitation> {
        let invitation = Invitation {
            id: Uuid::new_v4(),
            email: new_invitation.email.clone(),
            token_hash: new_invitation.token_hash.clone(),
            invited_by: new_invitation.invited_by,
            role_id: new_invitation.role_id,
            expires_at: new_invitation.expires_at,
            accepted_at: None,
            revoked_at: None,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .invitations
            .insert(invitation.id, invitation.clone());

        Ok(invitation)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Invitation> {
        self.state
            .read()
            .await
            .invitations
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Invitation", &id.to_string()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>> {
        Ok(self
            .state
            .read()
            .await
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn find_pending_by_email(&self, email: &str) -> Result<Option<Invitation>> {
        Ok(self
            .state
            .read()
            .await
            .invitations
            .values()
            .filter(|i| i.email == email && i.is_pending())
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Invitation>> {
        let mut invitations: Vec<Invitation> = self
            .state
            .read()
            .await
            .invitations
            .values()
            .cloned()
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn mark_accepted(&self, id: Uuid) -> Result<()> {
        if let Some(invitation) = self.state.write().await.invitations.get_mut(&id) {
            invitation.accepted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<()> {
        if let Some(invitation) = self.state.write().await.invitations.get_mut(&id) {
            invitation.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn reissue(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation> {
        let mut state = self.state.write().await;
        let invitation = state
            .invitations
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Invitation", &id.to_string()))?;

        invitation.token_hash = token_hash.to_string();
        invitation.expires_at = expires_at;
        invitation.created_at = Utc::now();

        Ok(invitation.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.state.write().await.invitations.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PasswordResetRepository for MemoryStore {
    async fn create(&self, new_token: &NewPasswordResetToken) -> Result<PasswordResetToken> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&new_token.user_id) {
            return Err(DatabaseError::ConstraintViolation(
                "password_reset_tokens references a missing user".to_string(),
            ));
        }

        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: new_token.user_id,
            token_hash: new_token.token_hash.clone(),
            expires_at: new_token.expires_at,
            used_at: None,
            ip_address: new_token.ip_address.clone(),
            user_agent: new_token.user_agent.clone(),
            created_at: Utc::now(),
        };
        state.password_resets.insert(token.id, token.clone());

        Ok(token)
    }

    async fn find_valid(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        Ok(self
            .state
            .read()
            .await
            .password_resets
            .values()
            .filter(|t| t.token_hash == token_hash && t.is_usable())
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<()> {
        if let Some(token) = self.state.write().await.password_resets.get_mut(&id) {
            token.used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn invalidate_for_user(&self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut count = 0;
        for token in self.state.write().await.password_resets.values_mut() {
            if token.user_id == user_id && token.used_at.is_none() {
                token.used_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, new_session: &NewSession) -> Result<Session> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&new_session.user_id) {
            return Err(DatabaseError::ConstraintViolation(
                "sessions references a missing user".to_string(),
            ));
        }
        if state
            .sessions
            .values()
            .any(|s| s.refresh_token_hash == new_session.refresh_token_hash)
        {
            return Err(DatabaseError::duplicate("Session", "this refresh token"));
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id: new_session.user_id,
            refresh_token_hash: new_session.refresh_token_hash.clone(),
            ip_address: new_session.ip_address.clone(),
            user_agent: new_session.user_agent.clone(),
            expires_at: new_session.expires_at,
            created_at: Utc::now(),
        };
        state.sessions.insert(session.id, session.clone());

        Ok(session)
    }

    async fn find_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        Ok(self
            .state
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == refresh_token_hash && s.expires_at > now)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.sessions.remove(&id).is_some())
    }

    async fn delete_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, s| s.refresh_token_hash != refresh_token_hash);
        Ok(state.sessions.len() != before)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use visor_models::PolicyEffect;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            first_name: None,
            last_name: None,
            email_verified: false,
        }
    }

    fn new_role(name: &str) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: None,
            is_system: false,
        }
    }

    fn new_policy(name: &str, effect: PolicyEffect, resource: &str, actions: &[&str]) -> NewPolicy {
        NewPolicy {
            name: name.to_string(),
            description: None,
            effect,
            resource: resource.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();

        let err = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn test_user_pagination_and_count() {
        let store = MemoryStore::new();
        for i in 0..5 {
            UserRepository::create(&store, &new_user(&format!("u{}@example.com", i)))
                .await
                .unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 5);
        assert_eq!(UserRepository::list(&store, 2, 0).await.unwrap().len(), 2);
        assert_eq!(UserRepository::list(&store, 2, 4).await.unwrap().len(), 1);
        assert!(UserRepository::list(&store, 2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_policies_are_distinct_across_roles() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        let editors = RoleRepository::create(&store, &new_role("editors"))
            .await
            .unwrap();
        let writers = RoleRepository::create(&store, &new_role("writers"))
            .await
            .unwrap();
        let policy = PolicyRepository::create(
            &store,
            &new_policy("edit-users", PolicyEffect::Allow, "users", &["update"]),
        )
        .await
        .unwrap();

        for role in [&editors, &writers] {
            store.attach_policy(role.id, policy.id).await.unwrap();
            store
                .assign_to_user(&AssignRole {
                    user_id: user.id,
                    role_id: role.id,
                    granted_by: None,
                })
                .await
                .unwrap();
        }

        let policies = store.get_user_policies(user.id).await.unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, "edit-users");
    }

    #[tokio::test]
    async fn test_assignment_is_idempotent() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        let role = RoleRepository::create(&store, &new_role("editors"))
            .await
            .unwrap();
        let assignment = AssignRole {
            user_id: user.id,
            role_id: role.id,
            granted_by: None,
        };

        store.assign_to_user(&assignment).await.unwrap();
        store.assign_to_user(&assignment).await.unwrap();
        assert_eq!(store.get_user_roles(user.id).await.unwrap().len(), 1);

        assert!(store.revoke_from_user(user.id, role.id).await.unwrap());
        assert!(!store.revoke_from_user(user.id, role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_assignment_requires_existing_rows() {
        let store = MemoryStore::new();
        let role = RoleRepository::create(&store, &new_role("editors"))
            .await
            .unwrap();

        let err = store
            .assign_to_user(&AssignRole {
                user_id: Uuid::new_v4(),
                role_id: role.id,
                granted_by: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_role_delete_cascades() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        let role = RoleRepository::create(&store, &new_role("editors"))
            .await
            .unwrap();
        let policy = PolicyRepository::create(
            &store,
            &new_policy("read-all", PolicyEffect::Allow, "*", &["read"]),
        )
        .await
        .unwrap();
        store.attach_policy(role.id, policy.id).await.unwrap();
        store
            .assign_to_user(&AssignRole {
                user_id: user.id,
                role_id: role.id,
                granted_by: None,
            })
            .await
            .unwrap();
        let invitation = InvitationRepository::create(
            &store,
            &NewInvitation {
                email: "b@example.com".to_string(),
                token_hash: "hash".to_string(),
                invited_by: user.id,
                role_id: Some(role.id),
                expires_at: Utc::now() + Duration::days(7),
            },
        )
        .await
        .unwrap();

        RoleRepository::delete(&store, role.id).await.unwrap();

        assert!(store.get_user_roles(user.id).await.unwrap().is_empty());
        assert!(store.get_user_policies(user.id).await.unwrap().is_empty());
        let invitation = InvitationRepository::find_by_id(&store, invitation.id)
            .await
            .unwrap();
        assert_eq!(invitation.role_id, None);
    }

    #[tokio::test]
    async fn test_user_delete_removes_sessions() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        SessionRepository::create(
            &store,
            &NewSession {
                user_id: user.id,
                refresh_token_hash: "rt".to_string(),
                ip_address: None,
                user_agent: None,
                expires_at: Utc::now() + Duration::days(7),
            },
        )
        .await
        .unwrap();

        UserRepository::delete(&store, user.id).await.unwrap();
        assert!(store.find_by_refresh_token("rt").await.unwrap().is_none());

        let err = UserRepository::delete(&store, user.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_session_delete_reports_removal_once() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        let session = SessionRepository::create(
            &store,
            &NewSession {
                user_id: user.id,
                refresh_token_hash: "rt".to_string(),
                ip_address: None,
                user_agent: None,
                expires_at: Utc::now() + Duration::days(7),
            },
        )
        .await
        .unwrap();

        assert!(SessionRepository::delete(&store, session.id).await.unwrap());
        assert!(!SessionRepository::delete(&store, session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_cleaned() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        SessionRepository::create(
            &store,
            &NewSession {
                user_id: user.id,
                refresh_token_hash: "old".to_string(),
                ip_address: None,
                user_agent: None,
                expires_at: Utc::now() - Duration::minutes(1),
            },
        )
        .await
        .unwrap();

        assert!(store.find_by_refresh_token("old").await.unwrap().is_none());
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_password_reset_tokens_invalidated() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, &new_user("a@example.com"))
            .await
            .unwrap();
        PasswordResetRepository::create(
            &store,
            &NewPasswordResetToken {
                user_id: user.id,
                token_hash: "t1".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
                ip_address: None,
                user_agent: None,
            },
        )
        .await
        .unwrap();

        assert!(store.find_valid("t1").await.unwrap().is_some());
        assert_eq!(store.invalidate_for_user(user.id).await.unwrap(), 1);
        assert!(store.find_valid("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_invitation_lookup() {
        let store = MemoryStore::new();
        let inviter = UserRepository::create(&store, &new_user("admin@example.com"))
            .await
            .unwrap();
        let invitation = InvitationRepository::create(
            &store,
            &NewInvitation {
                email: "b@example.com".to_string(),
                token_hash: "hash".to_string(),
                invited_by: inviter.id,
                role_id: None,
                expires_at: Utc::now() + Duration::days(7),
            },
        )
        .await
        .unwrap();

        assert!(store
            .find_pending_by_email("b@example.com")
            .await
            .unwrap()
            .is_some());

        InvitationRepository::revoke(&store, invitation.id)
            .await
            .unwrap();
        assert!(store
            .find_pending_by_email("b@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
