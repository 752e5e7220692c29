use crate::AppState;
use std::sync::Arc;
use std::time::Duration;
use visor_auth::PasswordHasher;
use visor_authz::{ensure_admin_user, ensure_system_roles};

/// How often expired refresh sessions are purged
pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Migrate the store and seed built-in roles and the configured admin.
/// Failures are logged and the server keeps running.
pub async fn prepare_database(state: &AppState) {
    if let Err(e) = state.db.setup().await {
        tracing::error!("Database setup failed: {}", e);
        return;
    }

    let roles = match ensure_system_roles(&state.db).await {
        Ok(roles) => roles,
        Err(e) => {
            tracing::error!("Seeding system roles failed: {}", e);
            return;
        }
    };

    let (Some(email), Some(password)) = (&state.config.admin.email, &state.config.admin.password) else {
        tracing::debug!("No admin account configured");
        return;
    };

    let password_hash = match PasswordHasher::hash(password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Hashing the admin password failed: {}", e);
            return;
        }
    };

    match ensure_admin_user(&state.db, &roles, email, password_hash).await {
        Ok(admin) => tracing::info!(user_id = %admin.id, "Admin account ready"),
        Err(e) => tracing::error!("Seeding the admin account failed: {}", e),
    }
}

/// Delete refresh sessions past their expiry; returns how many went
pub async fn purge_expired_sessions(state: &AppState) -> u64 {
    match state.db.sessions().cleanup_expired().await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "Expired refresh sessions purged");
            }
            removed
        }
        Err(e) => {
            tracing::warn!("Purging expired refresh sessions failed: {}", e);
            0
        }
    }
}

pub fn spawn_session_cleanup(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            purge_expired_sessions(&state).await;
        }
    })
}
