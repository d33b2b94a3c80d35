//! Credentials, opaque tokens and the per-account session lifecycle.

pub mod password;
pub mod session;
pub mod token;

pub use password::CredentialStore;
pub use session::SessionManager;
