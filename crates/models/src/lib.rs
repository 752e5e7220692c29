// Core modules
pub mod user;
pub mod role;
pub mod policy;
pub mod invitation;
pub mod password_reset;
pub mod session;

// Re-export commonly used types
pub use user::{normalize_email, User, NewUser, UpdateUser, UserProfile, ChangePassword};
pub use role::{Role, NewRole, UpdateRole, UserRole, AssignRole, ADMIN_ROLE, DEFAULT_ROLE};
pub use policy::{Policy, NewPolicy, UpdatePolicy, PolicyEffect, RolePolicy, WILDCARD};
pub use invitation::{Invitation, NewInvitation, InvitationStatus, InvitationSummary};
pub use password_reset::{PasswordResetToken, NewPasswordResetToken};
pub use session::{Session, NewSession};

// Role and policy names
lazy_static::lazy_static! {
    pub static ref NAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-z0-9_-]+$").unwrap();
}

// Policy resources and actions; `*` is the wildcard
lazy_static::lazy_static! {
    pub static ref PRIVILEGE_TOKEN_REGEX: regex::Regex =
        regex::Regex::new(r"^(\*|[a-z0-9_.-]+)$").unwrap();
}
