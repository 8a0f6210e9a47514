use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::auth::Session;
use crate::repositories::RepositoryError;

/// Trait defining session repository operations.
/// Sessions are keyed by the SHA-256 of the token, never the token itself.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: Session) -> Result<(), RepositoryError>;

    async fn find(&self, token_hash: &str) -> Result<Option<Session>, RepositoryError>;

    /// Deleting an unknown session is not an error
    async fn delete(&self, token_hash: &str) -> Result<(), RepositoryError>;

    /// Removes every session expired at `now`, returning how many went
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// SQLite implementation of SessionRepository
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::ConstraintViolation("Unknown user".to_string())
            }
            other => RepositoryError::from(other),
        })?;

        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<Session>, RepositoryError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT token_hash, user_id, created_at, expires_at
            FROM sessions
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn delete(&self, token_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repositories::user_repository::{NewUser, SqliteUserRepository, UserRepository};
    use chrono::Duration;

    async fn setup() -> (tempfile::TempDir, SqliteSessionRepository, uuid::Uuid) {
        let (dir, pool) = db::connect_temporary().await.unwrap();
        let user = SqliteUserRepository::new(pool.clone())
            .create(NewUser {
                email: "jane@example.com".to_string(),
                password_salt: "c2FsdA==".to_string(),
                password_digest: "ZGlnZXN0".to_string(),
            })
            .await
            .unwrap();
        (dir, SqliteSessionRepository::new(pool), user.id)
    }

    fn session(token_hash: &str, user_id: uuid::Uuid, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            token_hash: token_hash.to_string(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn test_create_find_delete() {
        let (_dir, repo, user_id) = setup().await;

        repo.create(session("abc", user_id, Duration::days(7)))
            .await
            .unwrap();
        let found = repo.find("abc").await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);

        repo.delete("abc").await.unwrap();
        assert!(repo.find("abc").await.unwrap().is_none());

        // second delete is a no-op
        repo.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_sessions() {
        let (_dir, repo, user_id) = setup().await;

        repo.create(session("old", user_id, Duration::seconds(-60)))
            .await
            .unwrap();
        repo.create(session("live", user_id, Duration::days(7)))
            .await
            .unwrap();

        let removed = repo.delete_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.find("old").await.unwrap().is_none());
        assert!(repo.find("live").await.unwrap().is_some());
    }
}
