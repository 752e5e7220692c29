pub mod connection;
pub mod error;
pub mod memory;
pub mod repositories;

pub use connection::{Database, DatabaseConfig, RdsSettings};
pub use error::{DatabaseError, Result};
pub use memory::MemoryStore;
pub use repositories::{
    InvitationRepository, PasswordResetRepository, PolicyRepository, RoleRepository,
    SessionRepository, UserRepository,
};
