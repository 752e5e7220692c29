use crate::error::{AuthError, Result};
use crate::jwt::{hash_token, JwtService, TokenPair};
use crate::password::{PasswordHasher, PasswordPolicy};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
use visor_database::Database;
use visor_models::{
    normalize_email, AssignRole, ChangePassword, NewSession, NewUser, User, UserProfile,
    DEFAULT_ROLE,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Where a request came from; recorded on refresh sessions
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserProfile,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub roles: Vec<String>,
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    jwt: Arc<JwtService>,
    password_policy: PasswordPolicy,
}

impl AuthService {
    pub fn new(db: Database, jwt: Arc<JwtService>, password_policy: PasswordPolicy) -> Self {
        Self {
            db,
            jwt,
            password_policy,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Register a new user with the default role
    pub async fn register(&self, request: RegisterRequest, ctx: &ClientContext) -> Result<AuthResponse> {
        request.validate()?;
        self.password_policy.check(&request.password)?;

        let email = normalize_email(&request.email);
        if self.db.users().find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists(
                "A user with this email already exists".to_string(),
            ));
        }

        let new_user = NewUser {
            email,
            password_hash: Some(PasswordHasher::hash(&request.password)?),
            first_name: request.first_name,
            last_name: request.last_name,
            email_verified: false,
        };
        let user = self
            .db
            .users()
            .create(&new_user)
            .await
            .map_err(AuthError::from_lookup)?;

        self.assign_default_role(user.id).await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.issue_session(user, ctx).await
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest, ctx: &ClientContext) -> Result<AuthResponse> {
        request.validate()?;

        let user = self
            .db
            .users()
            .find_by_email(&normalize_email(&request.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !PasswordHasher::verify(&request.password, password_hash)? {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        self.db.users().update_last_login(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        self.issue_session(user, ctx).await
    }

    /// Exchange a refresh token for a new pair; the presented token is
    /// consumed so replaying it fails
    pub async fn refresh(&self, refresh_token: &str, ctx: &ClientContext) -> Result<AuthResponse> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        let user_id = claims.user_id()?;

        let token_hash = hash_token(refresh_token);
        let session = self
            .db
            .sessions()
            .find_by_refresh_token(&token_hash)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Refresh token has been revoked".to_string()))?;

        if session.user_id != user_id {
            return Err(AuthError::InvalidToken("Refresh token mismatch".to_string()));
        }

        // Only the caller that removes the row may rotate it
        if !self.db.sessions().delete(session.id).await? {
            return Err(AuthError::InvalidToken("Refresh token has been revoked".to_string()));
        }

        let user = self.db.users().find_by_id(user_id).await.map_err(|_| AuthError::UserNotFound)?;
        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        self.issue_session(user, ctx).await
    }

    /// Revoke the refresh session if one is supplied
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<()> {
        if let Some(token) = refresh_token {
            let removed = self
                .db
                .sessions()
                .delete_by_refresh_token(&hash_token(token))
                .await?;
            tracing::debug!(removed, "Refresh session revoked on logout");
        }
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> Result<MeResponse> {
        let user = self
            .db
            .users()
            .find_by_id(user_id)
            .await
            .map_err(|_| AuthError::UserNotFound)?;

        Ok(MeResponse {
            roles: self.role_names(user_id).await?,
            user: user.into(),
        })
    }

    /// Verify the current password, store the new one and sign out every
    /// refresh session
    pub async fn change_password(&self, user_id: Uuid, request: ChangePassword) -> Result<()> {
        request.validate()?;

        let user = self
            .db
            .users()
            .find_by_id(user_id)
            .await
            .map_err(|_| AuthError::UserNotFound)?;

        let current_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !PasswordHasher::verify(&request.current_password, current_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.password_policy.check(&request.new_password)?;
        let new_hash = PasswordHasher::hash(&request.new_password)?;
        self.db.users().update_password(user_id, &new_hash).await?;

        let revoked = self.db.sessions().delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "Password changed");

        Ok(())
    }

    pub async fn role_names(&self, user_id: Uuid) -> Result<Vec<String>> {
        let roles = self.db.roles().get_user_roles(user_id).await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    pub async fn assign_default_role(&self, user_id: Uuid) -> Result<()> {
        match self.db.roles().find_by_name(DEFAULT_ROLE).await? {
            Some(role) => {
                self.db
                    .roles()
                    .assign_to_user(&AssignRole {
                        user_id,
                        role_id: role.id,
                        granted_by: None,
                    })
                    .await?;
            }
            None => tracing::warn!("Default role '{}' is missing; user has no roles", DEFAULT_ROLE),
        }
        Ok(())
    }

    /// Issue a token pair and persist the refresh session
    pub async fn issue_session(&self, user: User, ctx: &ClientContext) -> Result<AuthResponse> {
        let roles = self.role_names(user.id).await?;
        let tokens = self.jwt.generate_token_pair(user.id, &user.email, &roles)?;

        self.db
            .sessions()
            .create(&NewSession {
                user_id: user.id,
                refresh_token_hash: hash_token(&tokens.refresh_token),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                expires_at: Utc::now() + self.jwt.refresh_token_ttl(),
            })
            .await?;

        Ok(AuthResponse {
            tokens,
            user: user.into(),
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtConfig;
    use visor_models::NewRole;

    async fn service() -> AuthService {
        let db = Database::in_memory();
        db.roles()
            .create(&NewRole {
                name: DEFAULT_ROLE.to_string(),
                description: None,
                is_system: true,
            })
            .await
            .unwrap();

        let jwt = JwtService::new(&JwtConfig {
            key: "test-secret-key-min-32-characters-long".to_string(),
            ..Default::default()
        })
        .unwrap();

        AuthService::new(db, Arc::new(jwt), PasswordPolicy::default())
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "Str0ngPassword".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_register_assigns_default_role() {
        let auth = service().await;
        let response = auth
            .register(register_request("Jane@Example.com"), &ClientContext::default())
            .await
            .unwrap();

        assert_eq!(response.user.email, "jane@example.com");
        assert_eq!(response.roles, vec![DEFAULT_ROLE.to_string()]);

        let claims = auth.jwt().validate_access_token(&response.tokens.access_token).unwrap();
        assert_eq!(claims.roles, vec![DEFAULT_ROLE.to_string()]);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicates() {
        let auth = service().await;
        let mut weak = register_request("weak@example.com");
        weak.password = "password".to_string();
        assert!(matches!(
            auth.register(weak, &ClientContext::default()).await,
            Err(AuthError::WeakPassword(_))
        ));

        auth.register(register_request("dup@example.com"), &ClientContext::default())
            .await
            .unwrap();
        assert!(matches!(
            auth.register(register_request("DUP@example.com"), &ClientContext::default())
                .await,
            Err(AuthError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let auth = service().await;
        auth.register(register_request("jane@example.com"), &ClientContext::default())
            .await
            .unwrap();

        let result = auth
            .login(
                LoginRequest {
                    email: "jane@example.com".to_string(),
                    password: "WrongPassword1".to_string(),
                },
                &ClientContext::default(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let unknown = auth
            .login(
                LoginRequest {
                    email: "nobody@example.com".to_string(),
                    password: "Str0ngPassword".to_string(),
                },
                &ClientContext::default(),
            )
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_session() {
        let auth = service().await;
        let registered = auth
            .register(register_request("jane@example.com"), &ClientContext::default())
            .await
            .unwrap();
        let first = registered.tokens.refresh_token;

        let refreshed = auth.refresh(&first, &ClientContext::default()).await.unwrap();
        assert_ne!(refreshed.tokens.refresh_token, first);

        // The consumed token cannot be replayed
        assert!(matches!(
            auth.refresh(&first, &ClientContext::default()).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(auth
            .refresh(&refreshed.tokens.refresh_token, &ClientContext::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_rotates_once() {
        let auth = service().await;
        let registered = auth
            .register(register_request("jane@example.com"), &ClientContext::default())
            .await
            .unwrap();
        let token = registered.tokens.refresh_token;
        let ctx = ClientContext::default();

        let (a, b) = tokio::join!(auth.refresh(&token, &ctx), auth.refresh(&token, &ctx));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failed = if a.is_ok() { b } else { a };
        assert!(matches!(failed, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let auth = service().await;
        let registered = auth
            .register(register_request("jane@example.com"), &ClientContext::default())
            .await
            .unwrap();

        let wrong = auth
            .change_password(
                registered.user.id,
                ChangePassword {
                    current_password: "NotMyPassword1".to_string(),
                    new_password: "An0therPassword".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        auth.change_password(
            registered.user.id,
            ChangePassword {
                current_password: "Str0ngPassword".to_string(),
                new_password: "An0therPassword".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(auth
            .refresh(&registered.tokens.refresh_token, &ClientContext::default())
            .await
            .is_err());

        let login = auth
            .login(
                LoginRequest {
                    email: "jane@example.com".to_string(),
                    password: "An0therPassword".to_string(),
                },
                &ClientContext::default(),
            )
            .await;
        assert!(login.is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let auth = service().await;
        let registered = auth
            .register(register_request("jane@example.com"), &ClientContext::default())
            .await
            .unwrap();

        auth.logout(Some(&registered.tokens.refresh_token)).await.unwrap();
        assert!(auth
            .refresh(&registered.tokens.refresh_token, &ClientContext::default())
            .await
            .is_err());
    }
}
