use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,

    #[serde(skip_serializing)]
    pub token_hash: String,

    pub invited_by: Uuid,
    pub role_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn status_at(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.accepted_at.is_some() {
            InvitationStatus::Accepted
        } else if self.revoked_at.is_some() {
            InvitationStatus::Revoked
        } else if self.expires_at <= now {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Pending
        }
    }

    pub fn status(&self) -> InvitationStatus {
        self.status_at(Utc::now())
    }

    pub fn is_pending(&self) -> bool {
        self.status() == InvitationStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvitation {
    pub email: String,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub role_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// Invitation as returned to administrators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationSummary {
    pub id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub role_id: Option<Uuid>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationSummary {
    fn from(invitation: Invitation) -> Self {
        Self {
            status: invitation.status(),
            id: invitation.id,
            email: invitation.email,
            invited_by: invitation.invited_by,
            role_id: invitation.role_id,
            expires_at: invitation.expires_at,
            accepted_at: invitation.accepted_at,
            created_at: invitation.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation() -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            email: "new.hire@example.com".to_string(),
            token_hash: "abc".to_string(),
            invited_by: Uuid::new_v4(),
            role_id: None,
            expires_at: Utc::now() + Duration::days(7),
            accepted_at: None,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_precedence() {
        let now = Utc::now();
        let mut inv = invitation();
        assert_eq!(inv.status_at(now), InvitationStatus::Pending);

        inv.expires_at = now - Duration::minutes(1);
        assert_eq!(inv.status_at(now), InvitationStatus::Expired);

        inv.revoked_at = Some(now);
        assert_eq!(inv.status_at(now), InvitationStatus::Revoked);

        inv.accepted_at = Some(now);
        assert_eq!(inv.status_at(now), InvitationStatus::Accepted);
    }
}
