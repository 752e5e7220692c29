use super::UserRepository;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use visor_models::{NewUser, UpdateUser, User};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    /// Create a new user
    async fn create(&self, new_user: &NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, email_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("User", "this email"),
            other => other,
        })?;

        Ok(user)
    }

    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        Ok(user)
    }

    /// Find user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// List users, newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn update(&self, id: Uuid, update: &UpdateUser) -> Result<User> {
        if update.is_empty() {
            return self.find_by_id(id).await;
        }

        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(ref email) = update.email {
            query_builder.push(", email = ");
            query_builder.push_bind(email);
        }

        if let Some(ref first_name) = update.first_name {
            query_builder.push(", first_name = ");
            query_builder.push_bind(first_name);
        }

        if let Some(ref last_name) = update.last_name {
            query_builder.push(", last_name = ");
            query_builder.push_bind(last_name);
        }

        if let Some(is_active) = update.is_active {
            query_builder.push(", is_active = ");
            query_builder.push_bind(is_active);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(" RETURNING *");

        let user = query_builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("User", "this email"),
                other => other,
            })?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Hard delete; role assignments, sessions and reset tokens cascade
    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("User", &id.to_string()));
        }

        Ok(())
    }
}
