//! Encrypted credential storage for marketplace OAuth tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialLifecycleManager         │
//! │  - decides reuse / refresh / authorize   │
//! └─────────────────────────────────────────┘
//!      ↓ seal (encrypt)        ↑ decrypt
//! ┌─────────────────────────────────────────┐
//! │       Encryptor                          │
//! │  - AES-256-GCM, random nonce per token   │
//! │  - SECRET_KEY loaded or generated once   │
//! └─────────────────────────────────────────┘
//!      ↓ SealedTokens           ↑ Credential
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (SQLite)           │
//! │  - append-only rows, latest() by id      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Security
//!
//! - Tokens are encrypted before they reach the store; `append` only accepts
//!   [`SealedTokens`], which only the [`Encryptor`] can produce
//! - Rows are never updated in place; a refresh appends a new row
//! - Plaintext tokens live in memory for the duration of one run

use chrono::{DateTime, Utc};

mod encryption;
mod storage;
mod supervisor;

pub use encryption::{decrypt, encrypt, generate_key, validate_key, Encryptor};
pub use storage::{RequestLog, SqliteStore};
pub use supervisor::{is_fresh, threshold_duration, StalenessSupervisor, DEFAULT_THRESHOLD_HOURS};

use crate::error::Result;

/// Plaintext token pair issued by the token endpoint.
///
/// Not yet persisted. Must go through [`Encryptor::seal`] before storage.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// Encrypted token pair, ready for storage.
#[derive(Debug, Clone)]
pub struct SealedTokens {
    access_token: String,
    refresh_token: String,
}

impl SealedTokens {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

/// A persisted credential row. Token fields hold ciphertext.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub access_token: String,
    pub refresh_token: String,
}

/// Append-only storage of credential rows.
pub trait CredentialStore: Send + Sync {
    /// Returns the row with the highest id, or `None` when no row exists yet.
    fn latest(&self) -> Result<Option<Credential>>;

    /// Persists a new row, assigning its id and timestamp.
    ///
    /// Either the whole row is committed or nothing is.
    fn append(&self, tokens: &SealedTokens) -> Result<Credential>;
}
