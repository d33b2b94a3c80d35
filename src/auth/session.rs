//! Session lifecycle per account.
//!
//! An account holds exactly one (session token, refresh token) pair. Login and
//! reauthentication unconditionally replace that pair, which invalidates the
//! previous tokens because their digests no longer match the stored ones.
//!
//! ```text
//! Anonymous --register/login--> Authenticated --24h--> SessionExpired --60d--> RefreshExpired
//!                                     ^                      |                       |
//!                                     +----reauthenticate----+                       |
//!                                     +-------------------login----------------------+
//! ```
//!
//! Expiry columns all share the fixed-width format from `format_timestamp`,
//! so SQL string comparison orders them chronologically.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::password::CredentialStore;
use super::token::{hash_token, issue_pair, IssuedTokens};
use crate::config::AuthConfig;
use crate::db::{format_timestamp, parse_timestamp, Account, DbPool, TokenPair};
use crate::error::{Result, ServiceError};

#[derive(Clone)]
pub struct SessionManager {
    db: DbPool,
    credentials: CredentialStore,
    session_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, config: &AuthConfig) -> Result<Self> {
        let session_ttl = Duration::try_hours(config.session_ttl_hours)
            .ok_or_else(|| ServiceError::invalid_input("auth.session_ttl_hours is out of range"))?;
        let refresh_ttl = Duration::try_days(config.refresh_ttl_days)
            .ok_or_else(|| ServiceError::invalid_input("auth.refresh_ttl_days is out of range"))?;
        if Utc::now().checked_add_signed(session_ttl.max(refresh_ttl)).is_none() {
            return Err(ServiceError::invalid_input("Token lifetimes are out of range"));
        }

        Ok(Self {
            db,
            credentials: CredentialStore::new(config)?,
            session_ttl,
            refresh_ttl,
        })
    }

    fn issue(&self) -> IssuedTokens {
        issue_pair(Utc::now(), self.session_ttl, self.refresh_ttl)
    }

    /// Create an account and hand back its first token pair.
    ///
    /// Usernames are compared case-sensitively.
    pub async fn register(&self, username: &str, password: &str) -> Result<TokenPair> {
        if username.is_empty() || password.is_empty() {
            return Err(ServiceError::invalid_input("Username and password are required"));
        }

        let password_hash = self.credentials.hash_blocking(password.to_string()).await?;
        let issued = self.issue();
        let now = format_timestamp(Utc::now());

        let inserted: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO accounts (
                username, password_hash,
                session_token_hash, session_expires_at,
                refresh_token_hash, refresh_expires_at,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(&issued.session_token_hash)
        .bind(&issued.session_expires_at)
        .bind(&issued.refresh_token_hash)
        .bind(&issued.refresh_expires_at)
        .bind(&now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "accounts.username") {
                username_taken()
            } else {
                ServiceError::Database(e)
            }
        })?;

        info!(account_id = inserted.0, "Registered new account");
        Ok(issued.pair)
    }

    /// Check a username/password and rotate the account's token pair.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        let account = account.ok_or(ServiceError::InvalidCredentials)?;

        let verified = self
            .credentials
            .verify_blocking(password.to_string(), account.password_hash.clone())
            .await?;
        if !verified {
            debug!(account_id = account.id, "Rejected login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let issued = self.issue();
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                session_token_hash = ?, session_expires_at = ?,
                refresh_token_hash = ?, refresh_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&issued.session_token_hash)
        .bind(&issued.session_expires_at)
        .bind(&issued.refresh_token_hash)
        .bind(&issued.refresh_expires_at)
        .bind(account.id)
        .execute(&self.db)
        .await?;

        // Deleted between the lookup and the update
        if result.rows_affected() == 0 {
            return Err(ServiceError::InvalidCredentials);
        }

        info!(account_id = account.id, "Account logged in");
        Ok(issued.pair)
    }

    /// Resolve a session token to its account.
    pub async fn authorize(&self, session_token: &str) -> Result<Account> {
        let account: Option<Account> =
            sqlx::query_as("SELECT * FROM accounts WHERE session_token_hash = ?")
                .bind(hash_token(session_token))
                .fetch_optional(&self.db)
                .await?;

        let account = account.ok_or_else(|| ServiceError::not_found("Invalid session token"))?;

        let expires_at = parse_timestamp(&account.session_expires_at).map_err(|e| {
            ServiceError::Internal(format!("Corrupt session expiry for account {}: {}", account.id, e))
        })?;
        if Utc::now() >= expires_at {
            return Err(ServiceError::Expired);
        }

        Ok(account)
    }

    /// Trade a live refresh token for a new pair.
    ///
    /// The rotation is a single compare-and-swap on the refresh digest, so two
    /// callers racing with the same refresh token cannot both receive a pair.
    pub async fn reauthenticate(&self, refresh_token: &str) -> Result<TokenPair> {
        let presented_hash = hash_token(refresh_token);
        let now = format_timestamp(Utc::now());
        let issued = self.issue();

        let rotated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE accounts SET
                session_token_hash = ?, session_expires_at = ?,
                refresh_token_hash = ?, refresh_expires_at = ?
            WHERE refresh_token_hash = ? AND refresh_expires_at > ?
            RETURNING id
            "#,
        )
        .bind(&issued.session_token_hash)
        .bind(&issued.session_expires_at)
        .bind(&issued.refresh_token_hash)
        .bind(&issued.refresh_expires_at)
        .bind(&presented_hash)
        .bind(&now)
        .fetch_optional(&self.db)
        .await?;

        if let Some((account_id,)) = rotated {
            info!(account_id, "Session reauthenticated");
            return Ok(issued.pair);
        }

        // Work out why the swap did not happen
        let stale: Option<(i64, String)> = sqlx::query_as(
            "SELECT id, refresh_expires_at FROM accounts WHERE refresh_token_hash = ?",
        )
        .bind(&presented_hash)
        .fetch_optional(&self.db)
        .await?;

        match stale {
            Some((account_id, expires_at)) if expires_at <= now => {
                warn!(account_id, "Reauthentication with expired refresh token");
                Err(ServiceError::RefreshExpired)
            }
            _ => Err(ServiceError::not_found("Invalid refresh token")),
        }
    }

    /// Delete the account row. Owned plants must already be gone.
    pub async fn delete_account(&self, account_id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM accounts
            WHERE id = ? AND NOT EXISTS (SELECT 1 FROM plants WHERE user_id = accounts.id)
            "#,
        )
        .bind(account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(&self.db)
                .await?;
            return Err(match exists {
                Some(_) => ServiceError::Internal(format!("Account {} still owns plants", account_id)),
                None => ServiceError::not_found("Account not found"),
            });
        }

        info!(account_id, "Deleted account");
        Ok(())
    }
}

fn username_taken() -> ServiceError {
    ServiceError::Conflict("Username already exists".to_string())
}

fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();
            msg.contains("UNIQUE constraint failed") && msg.contains(column)
        }
        _ => false,
    }
}
