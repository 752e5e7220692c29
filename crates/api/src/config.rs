use serde::Deserialize;
use visor_auth::{EmailConfig, JwtConfig};
use visor_cache::CacheConfig;
use visor_database::{DatabaseConfig, RdsSettings};

pub const DEFAULT_CONFIG_FILE: &str = "visor.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `development` runs on the in-memory store; anything else on PostgreSQL
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub jwt: JwtConfig,
    pub auth: AuthSettings,
    pub email: EmailConfig,
    pub admin: AdminConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            jwt: JwtConfig::default(),
            auth: AuthSettings::default(),
            email: EmailConfig::default(),
            admin: AdminConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public address used in emailed links
    pub base_url: String,
    /// Directory served at `/`
    pub web_root: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            web_root: "wwwroot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub password_min_length: usize,
    /// Lifetime of the `__visor_auth` ticket
    pub cookie_minutes: i64,
    /// Idle timeout of the `__visor_session` state
    pub session_idle_minutes: u64,
    /// Upper bound on a session store load or commit
    pub session_io_timeout_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password_min_length: 8,
            cookie_minutes: 60,
            session_idle_minutes: 30,
            session_io_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional config file, then the environment
    /// (`JWT__KEY` sets `jwt.key`). `RDS_*` variables win over
    /// `database.url`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("VISOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config: AppConfig = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()?
            .try_deserialize()?;

        if std::env::var("DATABASE__URL").is_err() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }
        config.database.rds = RdsSettings::from_env();

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}
