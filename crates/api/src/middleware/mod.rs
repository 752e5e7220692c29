pub mod auth;
pub mod https;
pub mod session;

pub use auth::{authenticate, require_auth, AuthUser};
pub use https::redirect_to_https;
pub use session::{session_layer, Session};
