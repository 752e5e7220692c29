use crate::error::{AuthzError, Result};
use crate::privilege::PrivilegeService;
use uuid::Uuid;
use validator::Validate;
use visor_database::Database;
use visor_models::{AssignRole, NewRole, Policy, Role, UpdateRole};

#[derive(Clone)]
pub struct RoleService {
    db: Database,
    privileges: PrivilegeService,
}

impl RoleService {
    pub fn new(db: Database, privileges: PrivilegeService) -> Self {
        Self { db, privileges }
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        Ok(self.db.roles().list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Role> {
        Ok(self.db.roles().find_by_id(id).await?)
    }

    /// Roles created through the API are never system roles
    pub async fn create(&self, mut new_role: NewRole) -> Result<Role> {
        new_role.validate()?;
        new_role.is_system = false;

        let role = self.db.roles().create(&new_role).await?;
        tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    pub async fn update(&self, id: Uuid, update: UpdateRole) -> Result<Role> {
        update.validate()?;

        let existing = self.db.roles().find_by_id(id).await?;
        if existing.is_system {
            if let Some(name) = &update.name {
                if *name != existing.name {
                    return Err(AuthzError::BadRequest(format!(
                        "System role '{}' cannot be renamed",
                        existing.name
                    )));
                }
            }
        }

        Ok(self.db.roles().update(id, &update).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let role = self.db.roles().find_by_id(id).await?;
        if role.is_system {
            return Err(AuthzError::BadRequest(format!(
                "System role '{}' cannot be deleted",
                role.name
            )));
        }

        self.db.roles().delete(id).await?;
        self.privileges.invalidate_all().await?;

        tracing::info!(role_id = %id, "Role deleted");
        Ok(())
    }

    pub async fn assign_to_user(&self, user_id: Uuid, role_id: Uuid, granted_by: Option<Uuid>) -> Result<()> {
        self.db.users().find_by_id(user_id).await?;
        self.db.roles().find_by_id(role_id).await?;

        self.db
            .roles()
            .assign_to_user(&AssignRole {
                user_id,
                role_id,
                granted_by,
            })
            .await?;
        self.privileges.invalidate_user(user_id).await?;

        tracing::info!(user_id = %user_id, role_id = %role_id, "Role assigned");
        Ok(())
    }

    pub async fn revoke_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        if !self.db.roles().revoke_from_user(user_id, role_id).await? {
            return Err(AuthzError::NotFound("Role is not assigned to this user".to_string()));
        }
        self.privileges.invalidate_user(user_id).await?;

        tracing::info!(user_id = %user_id, role_id = %role_id, "Role revoked");
        Ok(())
    }

    pub async fn user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        self.db.users().find_by_id(user_id).await?;
        Ok(self.db.roles().get_user_roles(user_id).await?)
    }

    pub async fn attach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<()> {
        self.db.roles().find_by_id(role_id).await?;
        self.db.policies().find_by_id(policy_id).await?;

        self.db.roles().attach_policy(role_id, policy_id).await?;
        self.privileges.invalidate_all().await?;
        Ok(())
    }

    pub async fn detach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<()> {
        if !self.db.roles().detach_policy(role_id, policy_id).await? {
            return Err(AuthzError::NotFound("Policy is not attached to this role".to_string()));
        }
        self.privileges.invalidate_all().await?;
        Ok(())
    }

    pub async fn role_policies(&self, role_id: Uuid) -> Result<Vec<Policy>> {
        self.db.roles().find_by_id(role_id).await?;
        Ok(self.db.roles().get_role_policies(role_id).await?)
    }
}
