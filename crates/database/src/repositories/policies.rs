use super::PolicyRepository;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use visor_models::{NewPolicy, Policy, UpdatePolicy};

pub struct PgPolicyRepository {
    pool: PgPool,
}

impl PgPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_duplicate(err: sqlx::Error) -> DatabaseError {
    match DatabaseError::from(err) {
        DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Policy", "this name"),
        other => other,
    }
}

#[async_trait]
impl PolicyRepository for PgPolicyRepository {
    async fn create(&self, new_policy: &NewPolicy) -> Result<Policy> {
        let policy = sqlx::query_as::<_, Policy>(
            r#"
            INSERT INTO policies (name, description, effect, resource, actions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_policy.name)
        .bind(&new_policy.description)
        .bind(new_policy.effect)
        .bind(&new_policy.resource)
        .bind(&new_policy.actions)
        .fetch_one(&self.pool)
        .await
        .map_err(map_duplicate)?;

        Ok(policy)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Policy> {
        sqlx::query_as::<_, Policy>("SELECT * FROM policies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Policy", &id.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Policy>> {
        let policy = sqlx::query_as::<_, Policy>("SELECT * FROM policies WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(policy)
    }

    async fn list(&self) -> Result<Vec<Policy>> {
        let policies = sqlx::query_as::<_, Policy>("SELECT * FROM policies ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(policies)
    }

    async fn update(&self, id: Uuid, update: &UpdatePolicy) -> Result<Policy> {
        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE policies SET updated_at = NOW()");

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

        if let Some(effect) = update.effect {
            query_builder.push(", effect = ");
            query_builder.push_bind(effect);
            has_updates = true;
        }

        if let Some(ref resource) = update.resource {
            query_builder.push(", resource = ");
            query_builder.push_bind(resource);
            has_updates = true;
        }

        if let Some(ref actions) = update.actions {
            query_builder.push(", actions = ");
            query_builder.push_bind(actions);
            has_updates = true;
        }

        if !has_updates {
            return self.find_by_id(id).await;
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(" RETURNING *");

        query_builder
            .build_query_as::<Policy>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_duplicate)?
            .ok_or_else(|| DatabaseError::not_found("Policy", &id.to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM policies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Policy", &id.to_string()));
        }

        Ok(())
    }

    async fn get_user_policies(&self, user_id: Uuid) -> Result<Vec<Policy>> {
        let policies = sqlx::query_as::<_, Policy>(
            r#"
            SELECT DISTINCT p.* FROM policies p
            JOIN role_policies rp ON p.id = rp.policy_id
            JOIN user_roles ur ON rp.role_id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(policies)
    }
}
