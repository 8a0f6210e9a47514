use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::user::User;

/// Stored session row. The raw token is never persisted, only its SHA-256.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Freshly issued session token handed back to the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Body returned by register and login; the token itself travels in the cookie
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "user": {
        "id": "550e8400-e29b-41d4-a716-446655440000",
        "email": "jane@example.com",
        "createdAt": "2026-03-01T09:00:00Z"
    },
    "expiresAt": "2026-03-08T09:00:00Z"
}))]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}
