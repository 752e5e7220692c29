pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
