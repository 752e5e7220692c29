use super::InvitationRepository;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use visor_models::{Invitation, NewInvitation};

pub struct PgInvitationRepository {
    pool: PgPool,
}

impl PgInvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn create(&self, new_invitation: &NewInvitation) -> Result<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (email, token_hash, invited_by, role_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_invitation.email)
        .bind(&new_invitation.token_hash)
        .bind(new_invitation.invited_by)
        .bind(new_invitation.role_id)
        .bind(new_invitation.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(invitation)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Invitation> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Invitation", &id.to_string()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>> {
        let invitation =
            sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(invitation)
    }

    async fn find_pending_by_email(&self, email: &str) -> Result<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT * FROM invitations
            WHERE email = $1
              AND accepted_at IS NULL
              AND revoked_at IS NULL
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    async fn list(&self) -> Result<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    async fn mark_accepted(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE invitations SET accepted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE invitations SET revoked_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn reissue(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation> {
        sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitations
            SET token_hash = $1, expires_at = $2, created_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invitation", &id.to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
