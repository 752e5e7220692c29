use crate::config::AppConfig;
use chrono::Duration;
use std::sync::Arc;
use visor_auth::{
    AuthService, EmailService, InvitationService, JwtService, PasswordPolicy, PasswordResetService,
    TicketProtector, UserService,
};
use visor_authz::{PolicyService, PrivilegeService, RoleService};
use visor_cache::Cache;
use visor_database::Database;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub cache: Cache,
    pub email: EmailService,
    pub tickets: TicketProtector,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub role_service: RoleService,
    pub policy_service: PolicyService,
    pub privileges: PrivilegeService,
    pub invitation_service: InvitationService,
    pub password_reset_service: PasswordResetService,
}

impl AppState {
    /// Wire every service. Nothing here touches the database; the
    /// PostgreSQL pool connects on first use.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let db = if config.is_development() {
            Database::in_memory()
        } else {
            Database::connect_lazy(&config.database)?
        };
        tracing::info!("Database backend: {} ({})", db.backend_name(), config.database.describe());

        let cache = Cache::new(&config.cache).await?;
        tracing::info!("Cache backend: {}", cache.backend_name());

        let email = EmailService::new(&config.email)?;
        tracing::info!("Email provider: {}", email.provider_name());

        Self::with_backends(config, db, cache, email)
    }

    pub fn with_backends(
        config: AppConfig,
        db: Database,
        cache: Cache,
        email: EmailService,
    ) -> anyhow::Result<Self> {
        let jwt = Arc::new(JwtService::new(&config.jwt)?);
        let tickets = TicketProtector::new(&config.jwt.key)?;
        let password_policy = PasswordPolicy::new(config.auth.password_min_length);
        let base_url = config.server.base_url.clone();

        let auth_service = AuthService::new(db.clone(), jwt, password_policy);
        let user_service = UserService::new(db.clone(), cache.clone(), password_policy);
        let privileges = PrivilegeService::new(db.clone(), cache.clone());
        let role_service = RoleService::new(db.clone(), privileges.clone());
        let policy_service = PolicyService::new(db.clone(), privileges.clone());
        let invitation_service = InvitationService::new(
            db.clone(),
            email.clone(),
            auth_service.clone(),
            password_policy,
            base_url.clone(),
        );
        let password_reset_service =
            PasswordResetService::new(db.clone(), email.clone(), password_policy, base_url);

        Ok(Self {
            config,
            db,
            cache,
            email,
            tickets,
            auth_service,
            user_service,
            role_service,
            policy_service,
            privileges,
            invitation_service,
            password_reset_service,
        })
    }

    pub fn ticket_lifetime(&self) -> Duration {
        Duration::minutes(self.config.auth.cookie_minutes)
    }
}
