use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::auth::{Session, SessionToken};
use crate::models::user::{CredentialsRequest, User};
use crate::repositories::{NewUser, RepositoryError, SessionRepository, UserRepository};
use crate::services::password::PasswordRecord;
use crate::validation::{is_valid_email, normalize_email};

pub const SESSION_TTL_DAYS: i64 = 7;

/// Authentication service errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must not be empty")]
    InvalidPassword,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session is missing, unknown or expired")]
    InvalidSession,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

/// Trait defining authentication service operations
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user
    async fn register(&self, request: CredentialsRequest) -> Result<User, AuthError>;

    /// Whether `password` is the one `email` registered with
    async fn verify(&self, email: &str, password: &str) -> Result<bool, AuthError>;

    /// Verify credentials and open a new session
    async fn login(&self, request: CredentialsRequest)
        -> Result<(User, SessionToken), AuthError>;

    async fn issue_session(&self, user_id: Uuid) -> Result<SessionToken, AuthError>;

    /// Resolve a raw session token to its user
    async fn validate_session(&self, token: &str) -> Result<Uuid, AuthError>;

    /// Idempotent
    async fn revoke_session(&self, token: &str) -> Result<(), AuthError>;

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError>;
}

/// Implementation of AuthService
pub struct AuthServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    session_repository: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl AuthServiceImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_ttl(
            user_repository,
            session_repository,
            Duration::days(SESSION_TTL_DAYS),
        )
    }

    pub fn with_session_ttl(
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionRepository>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            user_repository,
            session_repository,
            session_ttl,
        }
    }

    /// 32 random bytes, hex encoded
    fn generate_token() -> String {
        let bytes: [u8; 32] = rand::rng().random();
        hex::encode(bytes)
    }

    /// Sessions are stored under this digest, never the raw token
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// PBKDF2 is CPU bound, keep it off the async workers
    async fn derive_password(password: String) -> Result<PasswordRecord, AuthError> {
        tokio::task::spawn_blocking(move || PasswordRecord::derive(&password))
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Password hashing failed: {}", e)))
    }

    async fn verify_password(record: PasswordRecord, password: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || record.verify(&password))
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Password verification failed: {}", e)))
    }

    /// Looks up the user and checks the password. Unknown emails still pay for
    /// one derivation so they cannot be told apart by timing.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, AuthError> {
        let email = normalize_email(email);
        let user = self.user_repository.find_by_email(&email).await?;

        let record = match &user {
            Some(user) => PasswordRecord {
                salt: user.password_salt.clone(),
                digest: user.password_digest.clone(),
            },
            None => PasswordRecord::placeholder(),
        };
        let matches = Self::verify_password(record, password.to_string()).await?;

        Ok(user.filter(|_| matches))
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, request: CredentialsRequest) -> Result<User, AuthError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if request.password.is_empty() {
            return Err(AuthError::InvalidPassword);
        }

        if self.user_repository.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let record = Self::derive_password(request.password).await?;

        // A concurrent registration can still win the race; the unique index decides
        let user = self
            .user_repository
            .create(NewUser {
                email,
                password_salt: record.salt,
                password_digest: record.digest,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation(_) => AuthError::DuplicateEmail,
                other => AuthError::from(other),
            })?;

        tracing::info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    async fn verify(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        Ok(self.authenticate(email, password).await?.is_some())
    }

    async fn login(
        &self,
        request: CredentialsRequest,
    ) -> Result<(User, SessionToken), AuthError> {
        let user = self
            .authenticate(&request.email, &request.password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let purged = self.session_repository.delete_expired(Utc::now()).await?;
        if purged > 0 {
            tracing::debug!(purged, "removed expired sessions");
        }

        let token = self.issue_session(user.id).await?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    async fn issue_session(&self, user_id: Uuid) -> Result<SessionToken, AuthError> {
        let token = Self::generate_token();
        let created_at = Utc::now();
        let expires_at = created_at + self.session_ttl;

        self.session_repository
            .create(Session {
                token_hash: Self::hash_token(&token),
                user_id,
                created_at,
                expires_at,
            })
            .await?;

        Ok(SessionToken { token, expires_at })
    }

    async fn validate_session(&self, token: &str) -> Result<Uuid, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidSession);
        }

        let token_hash = Self::hash_token(token);
        let session = self
            .session_repository
            .find(&token_hash)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if session.expires_at <= Utc::now() {
            self.session_repository.delete(&token_hash).await?;
            return Err(AuthError::InvalidSession);
        }

        Ok(session.user_id)
    }

    async fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        self.session_repository
            .delete(&Self::hash_token(token))
            .await?;
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }
}
