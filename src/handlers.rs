pub mod auth_handlers;
pub mod entry_handlers;
pub mod error;
pub mod recurring_handlers;
pub mod state_handlers;

pub use auth_handlers::CookieSettings;
pub use error::ErrorResponse;
