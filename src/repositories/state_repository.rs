use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::state::FinancialState;
use crate::normalize::sanitize_state;
use crate::repositories::RepositoryError;

/// Raw document storage, one JSON text per user
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// The stored document, `None` if the user never saved anything
    async fn fetch(&self, user_id: Uuid) -> Result<Option<String>, RepositoryError>;

    /// Insert or replace the user's document
    async fn save(&self, user_id: Uuid, document: &str) -> Result<(), RepositoryError>;
}

/// SQLite implementation of StateRepository
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn fetch(&self, user_id: Uuid) -> Result<Option<String>, RepositoryError> {
        let document: Option<(String,)> =
            sqlx::query_as("SELECT document FROM user_states WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(document.map(|(json,)| json))
    }

    async fn save(&self, user_id: Uuid, document: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_states (user_id, document, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(document)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// One async mutex per user. Holding it serializes read-modify-write cycles
/// for that user only. Entries are dropped once nobody holds or awaits them.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> UserLockGuard<'_> {
        // The shard guard must be released before awaiting
        let lock = self.locks.entry(user_id).or_default().clone();
        UserLockGuard {
            locks: self,
            user_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Every clone is handed out under the shard lock, so a count of one
    /// here means no holder and no waiter.
    fn prune(&self, user_id: Uuid) {
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock for one user; releasing it prunes the idle entry
pub struct UserLockGuard<'a> {
    locks: &'a UserLocks,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(self.user_id);
    }
}

/// Loads, sanitizes and saves whole state documents
pub struct StateStore {
    repository: Arc<dyn StateRepository>,
    locks: UserLocks,
}

impl StateStore {
    pub fn new(repository: Arc<dyn StateRepository>) -> Self {
        Self {
            repository,
            locks: UserLocks::new(),
        }
    }

    /// The user's state, or the default state if nothing was saved yet.
    /// Damaged records are healed on the way out; undecodable JSON is an error.
    ///
    /// Healing can mint ids and timestamps, so a healed document is written
    /// back under the user's lock and later reads see the same values.
    pub async fn load_state(&self, user_id: Uuid) -> Result<FinancialState, RepositoryError> {
        let (state, healed) = self.read_state(user_id).await?;
        if !healed {
            return Ok(state);
        }

        let _guard = self.locks.acquire(user_id).await;
        let (state, healed) = self.read_state(user_id).await?;
        if healed {
            tracing::info!(%user_id, "persisting healed state document");
            self.save_state(user_id, &state).await?;
        }
        Ok(state)
    }

    /// Decoded and sanitized document, and whether sanitizing changed it
    async fn read_state(&self, user_id: Uuid) -> Result<(FinancialState, bool), RepositoryError> {
        let Some(document) = self.repository.fetch(user_id).await? else {
            return Ok((FinancialState::default(), false));
        };

        let raw: serde_json::Value = serde_json::from_str(&document).map_err(|e| {
            RepositoryError::DatabaseError(format!("stored state is not valid JSON: {}", e))
        })?;
        let state = sanitize_state(&raw);
        let healed = serde_json::to_value(&state).map_or(true, |canonical| canonical != raw);
        Ok((state, healed))
    }

    pub async fn save_state(
        &self,
        user_id: Uuid,
        state: &FinancialState,
    ) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(state)
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
        self.repository.save(user_id, &document).await
    }

    /// Runs `mutate` against the freshest state while holding the user's lock.
    ///
    /// The result is saved only when `mutate` succeeds; on error nothing is
    /// written. Returns the closure's value together with the saved state.
    pub async fn mutate_state<T, E, F>(
        &self,
        user_id: Uuid,
        mutate: F,
    ) -> Result<(T, FinancialState), E>
    where
        F: FnOnce(&mut FinancialState) -> Result<T, E> + Send,
        T: Send,
        E: From<RepositoryError>,
    {
        let _guard = self.locks.acquire(user_id).await;

        let (mut state, _) = self.read_state(user_id).await?;
        let value = mutate(&mut state)?;
        self.save_state(user_id, &state).await?;

        Ok((value, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repositories::user_repository::{NewUser, SqliteUserRepository, UserRepository};
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory StateRepository for exercising the store without a database
    #[derive(Default)]
    struct MockStateRepository {
        documents: std::sync::Mutex<HashMap<Uuid, String>>,
    }

    #[async_trait]
    impl StateRepository for MockStateRepository {
        async fn fetch(&self, user_id: Uuid) -> Result<Option<String>, RepositoryError> {
            Ok(self.documents.lock().unwrap().get(&user_id).cloned())
        }

        async fn save(&self, user_id: Uuid, document: &str) -> Result<(), RepositoryError> {
            self.documents
                .lock()
                .unwrap()
                .insert(user_id, document.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_state_defaults_when_missing() {
        let store = StateStore::new(Arc::new(MockStateRepository::default()));
        let state = store.load_state(Uuid::new_v4()).await.unwrap();
        assert_eq!(state, FinancialState::default());
    }

    #[tokio::test]
    async fn test_load_state_rejects_corrupt_json() {
        let repo = Arc::new(MockStateRepository::default());
        let user_id = Uuid::new_v4();
        repo.save(user_id, "{not json").await.unwrap();

        let store = StateStore::new(repo);
        let result = store.load_state(user_id).await;
        assert!(matches!(result, Err(RepositoryError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_load_state_heals_damaged_document() {
        let repo = Arc::new(MockStateRepository::default());
        let user_id = Uuid::new_v4();
        repo.save(
            user_id,
            r#"{"budget": -5, "entries": [{"type": "bogus", "category": "Food", "amount": 1}]}"#,
        )
        .await
        .unwrap();

        let state = StateStore::new(repo).load_state(user_id).await.unwrap();
        assert_eq!(state.budget, 0.0);
        assert!(state.entries.is_empty());
    }

    #[tokio::test]
    async fn test_healed_document_reads_back_the_same() {
        let repo = Arc::new(MockStateRepository::default());
        let user_id = Uuid::new_v4();
        repo.save(
            user_id,
            r#"{"budget": 100, "entries": [
                {"id": "id_a", "type": "expense", "category": "Food", "amount": 1},
                {"id": "id_a", "type": "expense", "category": "Food", "amount": 2}
            ]}"#,
        )
        .await
        .unwrap();

        let store = StateStore::new(repo.clone());
        let first = store.load_state(user_id).await.unwrap();
        let second = store.load_state(user_id).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first.entries[0].id, first.entries[1].id);

        let stored = repo.fetch(user_id).await.unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored, serde_json::to_value(&first).unwrap());
    }

    #[tokio::test]
    async fn test_clean_document_is_not_rewritten() {
        let repo = Arc::new(MockStateRepository::default());
        let user_id = Uuid::new_v4();
        let document = serde_json::to_string(&FinancialState::default()).unwrap();
        repo.save(user_id, &document).await.unwrap();

        let store = StateStore::new(repo.clone());
        store.load_state(user_id).await.unwrap();
        assert_eq!(repo.fetch(user_id).await.unwrap().unwrap(), document);
    }

    #[tokio::test]
    async fn test_mutate_state_saves_only_on_success() {
        let repo = Arc::new(MockStateRepository::default());
        let store = StateStore::new(repo.clone());
        let user_id = Uuid::new_v4();

        let ((), state) = store
            .mutate_state::<_, RepositoryError, _>(user_id, |state| {
                state.budget = 1200.0;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(state.budget, 1200.0);

        let failed = store
            .mutate_state::<(), RepositoryError, _>(user_id, |state| {
                state.budget = 1.0;
                Err(RepositoryError::NotFound)
            })
            .await;
        assert!(matches!(failed, Err(RepositoryError::NotFound)));

        let reloaded = store.load_state(user_id).await.unwrap();
        assert_eq!(reloaded.budget, 1200.0);
    }

    #[tokio::test]
    async fn test_user_locks_are_independent() {
        let locks = Arc::new(UserLocks::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let _held = locks.acquire(alice).await;

        let other = tokio::time::timeout(Duration::from_secs(1), locks.acquire(bob)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire(alice)).await;
        assert!(same.is_err());
    }

    #[tokio::test]
    async fn test_user_locks_are_pruned_when_idle() {
        let locks = Arc::new(UserLocks::new());
        let alice = Uuid::new_v4();

        let held = locks.acquire(alice).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(alice).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        assert_eq!(locks.tracked(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);

        drop(locks.acquire(Uuid::new_v4()).await);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_state_roundtrip() {
        let (_dir, pool) = db::connect_temporary().await.unwrap();
        let user = SqliteUserRepository::new(pool.clone())
            .create(NewUser {
                email: "jane@example.com".to_string(),
                password_salt: "c2FsdA==".to_string(),
                password_digest: "ZGlnZXN0".to_string(),
            })
            .await
            .unwrap();
        let repo = SqliteStateRepository::new(pool);

        assert!(repo.fetch(user.id).await.unwrap().is_none());
        repo.save(user.id, r#"{"budget": 1}"#).await.unwrap();
        repo.save(user.id, r#"{"budget": 2}"#).await.unwrap();
        assert_eq!(
            repo.fetch(user.id).await.unwrap().as_deref(),
            Some(r#"{"budget": 2}"#)
        );
    }
}
