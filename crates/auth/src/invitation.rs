use crate::email::{templates, EmailMessage, EmailService};
use crate::error::{AuthError, Result};
use crate::jwt::{generate_secure_token, hash_token};
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::service::{AuthResponse, AuthService, ClientContext};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use visor_database::Database;
use visor_models::{
    normalize_email, AssignRole, Invitation, InvitationSummary, NewInvitation, NewUser,
};

pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

/// Pending invitations younger than this block a new one for the same email
const RESEND_COOLDOWN_MINUTES: i64 = 5;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email)]
    pub email: String,

    pub role_id: Option<Uuid>,

    #[validate(range(min = 1, max = 30))]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1))]
    pub token: String,

    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,
}

/// Public view of a token before acceptance
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationPreview {
    pub email: String,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub expires_at: chrono::DateTime<Utc>,
}

#[derive(Clone)]
pub struct InvitationService {
    db: Database,
    email_service: EmailService,
    auth: AuthService,
    password_policy: PasswordPolicy,
    base_url: String,
}

impl InvitationService {
    pub fn new(
        db: Database,
        email_service: EmailService,
        auth: AuthService,
        password_policy: PasswordPolicy,
        base_url: String,
    ) -> Self {
        Self {
            db,
            email_service,
            auth,
            password_policy,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create(&self, request: CreateInvitationRequest, invited_by: Uuid) -> Result<InvitationSummary> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if self.db.users().find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists(
                "A user with this email already exists".to_string(),
            ));
        }

        let role_name = match request.role_id {
            Some(role_id) => Some(
                self.db
                    .roles()
                    .find_by_id(role_id)
                    .await
                    .map_err(AuthError::from_lookup)?
                    .name,
            ),
            None => None,
        };

        if let Some(pending) = self.db.invitations().find_pending_by_email(&email).await? {
            let age = Utc::now().signed_duration_since(pending.created_at);
            if age.num_minutes() < RESEND_COOLDOWN_MINUTES {
                return Err(AuthError::BadRequest(
                    "An invitation was recently sent. Please wait a few minutes before resending."
                        .to_string(),
                ));
            }

            tracing::info!(email = %email, invitation_id = %pending.id, "Replacing stale pending invitation");
            self.db.invitations().delete(pending.id).await?;
        }

        let token = generate_secure_token();
        let expires_at =
            Utc::now() + Duration::days(request.expires_in_days.unwrap_or(DEFAULT_EXPIRY_DAYS));

        let invitation = self
            .db
            .invitations()
            .create(&NewInvitation {
                email,
                token_hash: hash_token(&token),
                invited_by,
                role_id: request.role_id,
                expires_at,
            })
            .await?;

        if let Err(e) = self.send_invitation_email(&invitation, &token, role_name.as_deref()).await {
            tracing::error!(
                invitation_id = %invitation.id,
                error = %e,
                "Failed to send invitation email; removing invitation"
            );
            let _ = self.db.invitations().delete(invitation.id).await;
            return Err(e);
        }

        tracing::info!(invitation_id = %invitation.id, email = %invitation.email, "Invitation created");

        Ok(invitation.into())
    }

    pub async fn list(&self) -> Result<Vec<InvitationSummary>> {
        let invitations = self.db.invitations().list().await?;
        Ok(invitations.into_iter().map(InvitationSummary::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<InvitationSummary> {
        let invitation = self
            .db
            .invitations()
            .find_by_id(id)
            .await
            .map_err(AuthError::from_lookup)?;
        Ok(invitation.into())
    }

    /// Resolve a token to its pending invitation
    pub async fn verify(&self, token: &str) -> Result<Invitation> {
        let invitation = self
            .db
            .invitations()
            .find_by_token_hash(&hash_token(token))
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Invalid invitation token".to_string()))?;

        if !invitation.is_pending() {
            return Err(AuthError::InvalidToken(
                "Invitation is no longer valid".to_string(),
            ));
        }

        Ok(invitation)
    }

    pub async fn preview(&self, token: &str) -> Result<InvitationPreview> {
        let invitation = self.verify(token).await?;

        let role_name = match invitation.role_id {
            Some(role_id) => self.db.roles().find_by_id(role_id).await.ok().map(|r| r.name),
            None => None,
        };

        Ok(InvitationPreview {
            email: invitation.email,
            role_id: invitation.role_id,
            role_name,
            expires_at: invitation.expires_at,
        })
    }

    /// Create the invited account and sign it in
    pub async fn accept(&self, request: AcceptInvitationRequest, ctx: &ClientContext) -> Result<AuthResponse> {
        request.validate()?;
        self.password_policy.check(&request.password)?;

        let invitation = self.verify(&request.token).await?;

        if self.db.users().find_by_email(&invitation.email).await?.is_some() {
            return Err(AuthError::AlreadyExists(
                "A user with this email already exists".to_string(),
            ));
        }

        let user = self
            .db
            .users()
            .create(&NewUser {
                email: invitation.email.clone(),
                password_hash: Some(PasswordHasher::hash(&request.password)?),
                first_name: request.first_name,
                last_name: request.last_name,
                // Receiving the emailed token proves ownership of the address
                email_verified: true,
            })
            .await
            .map_err(AuthError::from_lookup)?;

        match invitation.role_id {
            Some(role_id) => {
                self.db
                    .roles()
                    .assign_to_user(&AssignRole {
                        user_id: user.id,
                        role_id,
                        granted_by: Some(invitation.invited_by),
                    })
                    .await?;
            }
            None => self.auth.assign_default_role(user.id).await?,
        }

        self.db.invitations().mark_accepted(invitation.id).await?;

        tracing::info!(invitation_id = %invitation.id, user_id = %user.id, "Invitation accepted");

        self.auth.issue_session(user, ctx).await
    }

    pub async fn revoke(&self, id: Uuid) -> Result<()> {
        let invitation = self
            .db
            .invitations()
            .find_by_id(id)
            .await
            .map_err(AuthError::from_lookup)?;

        if !invitation.is_pending() {
            return Err(AuthError::BadRequest(
                "Only pending invitations can be revoked".to_string(),
            ));
        }

        self.db.invitations().revoke(id).await?;
        tracing::info!(invitation_id = %id, "Invitation revoked");
        Ok(())
    }

    /// Issue a fresh token and expiry and email it again
    pub async fn resend(&self, id: Uuid) -> Result<InvitationSummary> {
        let invitation = self
            .db
            .invitations()
            .find_by_id(id)
            .await
            .map_err(AuthError::from_lookup)?;

        if invitation.accepted_at.is_some() || invitation.revoked_at.is_some() {
            return Err(AuthError::BadRequest(
                "Accepted or revoked invitations cannot be resent".to_string(),
            ));
        }

        let token = generate_secure_token();
        let expires_at = Utc::now() + Duration::days(DEFAULT_EXPIRY_DAYS);
        let invitation = self
            .db
            .invitations()
            .reissue(id, &hash_token(&token), expires_at)
            .await?;

        let role_name = match invitation.role_id {
            Some(role_id) => self.db.roles().find_by_id(role_id).await.ok().map(|r| r.name),
            None => None,
        };
        self.send_invitation_email(&invitation, &token, role_name.as_deref())
            .await?;

        tracing::info!(invitation_id = %id, "Invitation resent");
        Ok(invitation.into())
    }

    async fn send_invitation_email(
        &self,
        invitation: &Invitation,
        token: &str,
        role_name: Option<&str>,
    ) -> Result<()> {
        let inviter_name = match self.db.users().find_by_id(invitation.invited_by).await {
            Ok(user) => user.display_name(),
            Err(_) => "A team member".to_string(),
        };

        let link = format!("{}/accept-invitation?token={}", self.base_url, token);
        let (text_body, html_body) =
            templates::invitation(&inviter_name, &link, role_name, &invitation.expires_at);

        self.email_service
            .send(EmailMessage {
                to: invitation.email.clone(),
                to_name: None,
                subject: "You've been invited to Visor".to_string(),
                text_body,
                html_body: Some(html_body),
            })
            .await
    }
}
