pub mod session_repository;
pub mod state_repository;
pub mod user_repository;

pub use session_repository::{SessionRepository, SqliteSessionRepository};
pub use state_repository::{
    SqliteStateRepository, StateRepository, StateStore, UserLockGuard, UserLocks,
};
pub use user_repository::{NewUser, SqliteUserRepository, UserRepository};

/// Repository errors for database operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Resource not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            other => RepositoryError::DatabaseError(other.to_string()),
        }
    }
}
