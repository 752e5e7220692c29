pub mod service;
pub mod templates;

pub use service::{EmailConfig, EmailMessage, EmailService};
