//! Account and token pair models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub session_token_hash: String,
    pub session_expires_at: String,
    pub refresh_token_hash: String,
    pub refresh_expires_at: String,
    pub created_at: String,
}

/// Freshly issued session/refresh tokens. The raw tokens only ever exist
/// here; the database keeps their digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub session_token: String,
    pub session_expiration: String,
    pub refresh_token: String,
    pub refresh_expiration: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}
