pub mod error;
pub mod policy_service;
pub mod privilege;
pub mod role_service;
pub mod seed;

pub use error::{AuthzError, Result};
pub use policy_service::PolicyService;
pub use privilege::{
    actions, evaluate, resources, CheckRequest, CheckResponse, PrivilegeService, PrivilegeSummary,
};
pub use role_service::RoleService;
pub use seed::{ensure_admin_user, ensure_system_roles, SystemRoles};
