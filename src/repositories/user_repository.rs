use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::user::User;
use crate::repositories::RepositoryError;

/// Everything needed to insert a user; the email is already normalized
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_salt: String,
    pub password_digest: String,
}

/// Trait defining user repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user; a taken email is a constraint violation
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Find a user by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_salt, password_digest, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.password_salt)
        .bind(&user.password_digest)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                id,
                email: user.email,
                password_salt: user.password_salt,
                password_digest: user.password_digest,
                created_at,
            }),
            Err(sqlx::Error::Database(db_err)) => {
                // Check for unique constraint violation (duplicate email)
                if db_err.is_unique_violation() {
                    Err(RepositoryError::ConstraintViolation(
                        "Email already exists".to_string(),
                    ))
                } else {
                    Err(RepositoryError::DatabaseError(db_err.to_string()))
                }
            }
            Err(e) => Err(RepositoryError::DatabaseError(e.to_string())),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_salt, password_digest, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_salt, password_digest, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }
}
