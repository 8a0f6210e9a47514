pub mod auth_service;
pub mod password;
pub mod state_service;

pub use auth_service::{AuthError, AuthService, AuthServiceImpl, SESSION_TTL_DAYS};
pub use state_service::{StateError, StateService, StateServiceImpl};
