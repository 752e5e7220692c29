use crate::error::{AuthError, Result};
use crate::password::{PasswordHasher, PasswordPolicy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use visor_cache::{privileges_cache_key, Cache};
use visor_database::Database;
use visor_models::{normalize_email, AssignRole, NewUser, UpdateUser, UserProfile};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageRequest {
    /// Page number from 1 and page size within 1..=100. The row offset of
    /// the page must fit in an `i64`.
    pub fn resolve(&self) -> Result<(i64, i64)> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);

        if page < 1 {
            return Err(AuthError::ValidationError("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(AuthError::ValidationError(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        if (page - 1).checked_mul(per_page).is_none() {
            return Err(AuthError::ValidationError("page is out of range".to_string()));
        }

        Ok((page, per_page))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,

    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

/// Administrative user management
#[derive(Clone)]
pub struct UserService {
    db: Database,
    cache: Cache,
    password_policy: PasswordPolicy,
}

impl UserService {
    pub fn new(db: Database, cache: Cache, password_policy: PasswordPolicy) -> Self {
        Self {
            db,
            cache,
            password_policy,
        }
    }

    pub async fn list(&self, request: PageRequest) -> Result<Page<UserProfile>> {
        let (page, per_page) = request.resolve()?;

        let users = self
            .db
            .users()
            .list(per_page, (page - 1) * per_page)
            .await?;
        let total = self.db.users().count().await?;

        Ok(Page {
            items: users.into_iter().map(UserProfile::from).collect(),
            total,
            page,
            per_page,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<UserProfile> {
        let user = self
            .db
            .users()
            .find_by_id(id)
            .await
            .map_err(AuthError::from_lookup)?;
        Ok(user.into())
    }

    /// Create a user, optionally granting roles in the same call
    pub async fn create(&self, request: CreateUserRequest, granted_by: Uuid) -> Result<UserProfile> {
        request.validate()?;
        self.password_policy.check(&request.password)?;

        for role_id in &request.role_ids {
            self.db
                .roles()
                .find_by_id(*role_id)
                .await
                .map_err(AuthError::from_lookup)?;
        }

        let user = self
            .db
            .users()
            .create(&NewUser {
                email: normalize_email(&request.email),
                password_hash: Some(PasswordHasher::hash(&request.password)?),
                first_name: request.first_name,
                last_name: request.last_name,
                email_verified: false,
            })
            .await
            .map_err(AuthError::from_lookup)?;

        for role_id in request.role_ids {
            self.db
                .roles()
                .assign_to_user(&AssignRole {
                    user_id: user.id,
                    role_id,
                    granted_by: Some(granted_by),
                })
                .await?;
        }

        tracing::info!(user_id = %user.id, created_by = %granted_by, "User created");

        Ok(user.into())
    }

    pub async fn update(&self, id: Uuid, mut update: UpdateUser) -> Result<UserProfile> {
        update.validate()?;
        update.email = update.email.as_deref().map(normalize_email);

        let user = self
            .db
            .users()
            .update(id, &update)
            .await
            .map_err(AuthError::from_lookup)?;

        if update.is_active == Some(false) {
            self.revoke_sessions(id).await?;
        }

        Ok(user.into())
    }

    /// Disable sign-in and revoke every refresh session
    pub async fn deactivate(&self, id: Uuid) -> Result<UserProfile> {
        self.update(
            id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.db
            .users()
            .delete(id)
            .await
            .map_err(AuthError::from_lookup)?;
        self.cache.delete(&privileges_cache_key(&id.to_string())).await?;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn revoke_sessions(&self, id: Uuid) -> Result<()> {
        let revoked = self.db.sessions().delete_all_for_user(id).await?;
        tracing::info!(user_id = %id, revoked, "User deactivated");
        Ok(())
    }
}
