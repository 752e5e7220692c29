pub mod email;
pub mod error;
pub mod invitation;
pub mod jwt;
pub mod password;
pub mod password_reset;
pub mod service;
pub mod ticket;
pub mod user_service;

pub use email::{EmailConfig, EmailMessage, EmailService};
pub use error::{AuthError, Result};
pub use invitation::{AcceptInvitationRequest, CreateInvitationRequest, InvitationPreview, InvitationService};
pub use jwt::{hash_token, Claims, JwtConfig, JwtService, TokenPair, TokenType};
pub use password::{PasswordHasher, PasswordPolicy};
pub use password_reset::{ForgotPasswordRequest, PasswordResetService, ResetPasswordRequest};
pub use service::{
    AuthResponse, AuthService, ClientContext, LoginRequest, MeResponse, RefreshTokenRequest,
    RegisterRequest,
};
pub use ticket::{AuthTicket, TicketProtector, AUTH_COOKIE_NAME};
pub use user_service::{CreateUserRequest, Page, PageRequest, UserService};
