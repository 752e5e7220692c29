use thiserror::Error;
use visor_database::DatabaseError;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl From<DatabaseError> for AuthzError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => AuthzError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) => AuthzError::AlreadyExists(msg),
            other => AuthzError::Database(other),
        }
    }
}

impl From<visor_cache::CacheError> for AuthzError {
    fn from(err: visor_cache::CacheError) -> Self {
        AuthzError::CacheError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthzError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthzError::ValidationError(err.to_string())
    }
}
