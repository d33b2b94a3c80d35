//! Opaque bearer tokens.
//!
//! Tokens are 256 bits from the thread-local CSPRNG, hex encoded. Only their
//! SHA-256 digest is persisted, so a leaked database row cannot be replayed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::{format_timestamp, TokenPair};

/// Generate a random token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A token pair plus everything the store needs to persist it
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub session_token_hash: String,
    pub session_expires_at: String,
    pub refresh_token_hash: String,
    pub refresh_expires_at: String,
}

/// Mint a new pair whose windows both start at `now`
pub fn issue_pair(now: DateTime<Utc>, session_ttl: Duration, refresh_ttl: Duration) -> IssuedTokens {
    let session_token = generate_token();
    let refresh_token = generate_token();
    let session_expires_at = format_timestamp(now + session_ttl);
    let refresh_expires_at = format_timestamp(now + refresh_ttl);

    IssuedTokens {
        session_token_hash: hash_token(&session_token),
        refresh_token_hash: hash_token(&refresh_token),
        pair: TokenPair {
            session_token,
            session_expiration: session_expires_at.clone(),
            refresh_token,
            refresh_expiration: refresh_expires_at.clone(),
        },
        session_expires_at,
        refresh_expires_at,
    }
}
