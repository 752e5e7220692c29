//! Built-in roles and policies every deployment starts with.

use crate::error::Result;
use visor_database::Database;
use visor_models::{
    normalize_email, AssignRole, NewPolicy, NewRole, NewUser, PolicyEffect, Role, User,
    ADMIN_ROLE, DEFAULT_ROLE, WILDCARD,
};

pub const FULL_ACCESS_POLICY: &str = "full-access";
pub const SELF_SERVICE_POLICY: &str = "self-service";

#[derive(Debug, Clone)]
pub struct SystemRoles {
    pub admin: Role,
    pub user: Role,
}

/// Create the `admin` and `user` roles and their policies when missing.
/// Safe to run on every startup.
pub async fn ensure_system_roles(db: &Database) -> Result<SystemRoles> {
    let admin = ensure_role(
        db,
        ADMIN_ROLE,
        "Full access to every resource",
        NewPolicy {
            name: FULL_ACCESS_POLICY.to_string(),
            description: Some("Allow every action on every resource".to_string()),
            effect: PolicyEffect::Allow,
            resource: WILDCARD.to_string(),
            actions: vec![WILDCARD.to_string()],
        },
    )
    .await?;

    let user = ensure_role(
        db,
        DEFAULT_ROLE,
        "Default role for registered users",
        NewPolicy {
            name: SELF_SERVICE_POLICY.to_string(),
            description: Some("Read and update the caller's own profile".to_string()),
            effect: PolicyEffect::Allow,
            resource: crate::privilege::resources::PROFILE.to_string(),
            actions: vec![
                crate::privilege::actions::READ.to_string(),
                crate::privilege::actions::UPDATE.to_string(),
            ],
        },
    )
    .await?;

    Ok(SystemRoles { admin, user })
}

async fn ensure_role(db: &Database, name: &str, description: &str, policy: NewPolicy) -> Result<Role> {
    let role = match db.roles().find_by_name(name).await? {
        Some(role) => role,
        None => {
            tracing::info!(role = name, "Seeding system role");
            db.roles()
                .create(&NewRole {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    is_system: true,
                })
                .await?
        }
    };

    let policy = match db.policies().find_by_name(&policy.name).await? {
        Some(existing) => existing,
        None => db.policies().create(&policy).await?,
    };
    db.roles().attach_policy(role.id, policy.id).await?;

    Ok(role)
}

/// Create the bootstrap administrator if no user owns `email` yet, and make
/// sure it holds the admin role either way.
pub async fn ensure_admin_user(
    db: &Database,
    roles: &SystemRoles,
    email: &str,
    password_hash: String,
) -> Result<User> {
    let email = normalize_email(email);

    let user = match db.users().find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let user = db
                .users()
                .create(&NewUser {
                    email,
                    password_hash: Some(password_hash),
                    first_name: Some("Admin".to_string()),
                    last_name: None,
                    email_verified: true,
                })
                .await?;
            tracing::info!(user_id = %user.id, "Seeded admin user");
            user
        }
    };

    db.roles()
        .assign_to_user(&AssignRole {
            user_id: user.id,
            role_id: roles.admin.id,
            granted_by: None,
        })
        .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::evaluate;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let db = Database::in_memory();
        let first = ensure_system_roles(&db).await.unwrap();
        let second = ensure_system_roles(&db).await.unwrap();

        assert_eq!(first.admin.id, second.admin.id);
        assert!(first.admin.is_system && first.user.is_system);
        assert_eq!(db.roles().list().await.unwrap().len(), 2);
        assert_eq!(db.policies().list().await.unwrap().len(), 2);
        assert_eq!(db.roles().get_role_policies(first.user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_user_gets_full_access() {
        let db = Database::in_memory();
        let roles = ensure_system_roles(&db).await.unwrap();

        let admin = ensure_admin_user(&db, &roles, "Admin@Visor.local", "hash".to_string())
            .await
            .unwrap();
        let again = ensure_admin_user(&db, &roles, "admin@visor.local", "other".to_string())
            .await
            .unwrap();
        assert_eq!(admin.id, again.id);
        assert_eq!(again.password_hash.as_deref(), Some("hash"));

        let policies = db.policies().get_user_policies(admin.id).await.unwrap();
        assert!(evaluate(&policies, "policies", "delete").allowed);
    }
}
