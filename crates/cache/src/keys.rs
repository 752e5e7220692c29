//! Key layout shared by every cache user.

/// Matches every cached privilege set
pub const PRIVILEGES_PATTERN: &str = "privileges:*";

pub fn session_cache_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

pub fn privileges_cache_key(user_id: &str) -> String {
    format!("privileges:{}", user_id)
}
