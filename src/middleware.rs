pub mod auth_middleware;

pub use auth_middleware::{auth_middleware, AuthenticatedUser, SESSION_COOKIE_NAME};
