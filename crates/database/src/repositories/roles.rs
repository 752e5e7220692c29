use super::RoleRepository;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use visor_models::{AssignRole, NewRole, Policy, Role, UpdateRole};

pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_duplicate(err: sqlx::Error) -> DatabaseError {
    match DatabaseError::from(err) {
        DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Role", "this name"),
        other => other,
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    /// Create a new role
    async fn create(&self, new_role: &NewRole) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description, is_system)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .bind(new_role.is_system)
        .fetch_one(&self.pool)
        .await
        .map_err(map_duplicate)?;

        Ok(role)
    }

    /// Find role by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        Ok(role)
    }

    /// Find role by name
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    async fn update(&self, id: Uuid, update: &UpdateRole) -> Result<Role> {
        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE roles SET updated_at = NOW()");

        let mut has_updates = false;

        if let Some(ref name) = update.name {
            query_builder.push(", name = ");
            query_builder.push_bind(name);
            has_updates = true;
        }

        if let Some(ref description) = update.description {
            query_builder.push(", description = ");
            query_builder.push_bind(description);
            has_updates = true;
        }

        if !has_updates {
            return self.find_by_id(id).await;
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(" RETURNING *");

        let role = query_builder
            .build_query_as::<Role>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_duplicate)?
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        Ok(role)
    }

    /// Delete role; assignments and policy attachments cascade
    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Role", &id.to_string()));
        }

        Ok(())
    }

    async fn assign_to_user(&self, assignment: &AssignRole) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, granted_by)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(assignment.user_id)
        .bind(assignment.role_id)
        .bind(assignment.granted_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn attach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_policies (role_id, policy_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(policy_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn detach_policy(&self, role_id: Uuid, policy_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM role_policies WHERE role_id = $1 AND policy_id = $2")
                .bind(role_id)
                .bind(policy_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_role_policies(&self, role_id: Uuid) -> Result<Vec<Policy>> {
        let policies = sqlx::query_as::<_, Policy>(
            r#"
            SELECT p.* FROM policies p
            JOIN role_policies rp ON p.id = rp.policy_id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(policies)
    }
}
