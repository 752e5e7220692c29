pub mod cache;
pub mod error;
pub mod keys;

pub use cache::{Cache, CacheConfig};
pub use error::{CacheError, Result};
pub use keys::{privileges_cache_key, session_cache_key, PRIVILEGES_PATTERN};
