use crate::email::{templates, EmailMessage, EmailService};
use crate::error::{AuthError, Result};
use crate::jwt::{generate_secure_token, hash_token};
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::service::ClientContext;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use visor_database::Database;
use visor_models::{normalize_email, NewPasswordResetToken};

const TOKEN_LIFETIME_HOURS: i64 = 1;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,

    pub new_password: String,
}

#[derive(Clone)]
pub struct PasswordResetService {
    db: Database,
    email_service: EmailService,
    password_policy: PasswordPolicy,
    base_url: String,
}

impl PasswordResetService {
    pub fn new(
        db: Database,
        email_service: EmailService,
        password_policy: PasswordPolicy,
        base_url: String,
    ) -> Self {
        Self {
            db,
            email_service,
            password_policy,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Email a reset link. Unknown and inactive addresses get the same
    /// outcome as known ones.
    pub async fn request_reset(&self, request: ForgotPasswordRequest, ctx: &ClientContext) -> Result<()> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let user = match self.db.users().find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::warn!("Password reset requested for unknown or inactive email");
                return Ok(());
            }
        };

        let invalidated = self.db.password_resets().invalidate_for_user(user.id).await?;
        if invalidated > 0 {
            tracing::debug!(user_id = %user.id, invalidated, "Superseded earlier reset tokens");
        }

        let token = generate_secure_token();
        let expires_at = Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS);

        self.db
            .password_resets()
            .create(&NewPasswordResetToken {
                user_id: user.id,
                token_hash: hash_token(&token),
                expires_at,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            })
            .await?;

        let reset_link = format!("{}/reset-password?token={}", self.base_url, token);
        let (text_body, html_body) = templates::password_reset(
            &user.display_name(),
            &reset_link,
            &expires_at,
            ctx.ip_address.as_deref().unwrap_or("unknown"),
        );

        self.email_service
            .send(EmailMessage {
                to: user.email.clone(),
                to_name: Some(user.display_name()),
                subject: "Reset your Visor password".to_string(),
                text_body,
                html_body: Some(html_body),
            })
            .await?;

        tracing::info!(user_id = %user.id, "Password reset email sent");

        Ok(())
    }

    /// User the token belongs to, if it is unused and unexpired
    pub async fn verify_token(&self, token: &str) -> Result<Uuid> {
        let record = self
            .db
            .password_resets()
            .find_valid(&hash_token(token))
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Invalid or expired reset token".to_string()))?;

        Ok(record.user_id)
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()> {
        request.validate()?;

        let record = self
            .db
            .password_resets()
            .find_valid(&hash_token(&request.token))
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Invalid or expired reset token".to_string()))?;

        self.password_policy.check(&request.new_password)?;
        let password_hash = PasswordHasher::hash(&request.new_password)?;

        self.db
            .users()
            .update_password(record.user_id, &password_hash)
            .await
            .map_err(AuthError::from_lookup)?;
        self.db.password_resets().mark_used(record.id).await?;

        // Force re-login everywhere
        let revoked = self.db.sessions().delete_all_for_user(record.user_id).await?;

        tracing::info!(user_id = %record.user_id, revoked, "Password reset successfully");

        Ok(())
    }
}
