//! Token vault subsystem.
//!
//! # Data Flow
//! ```text
//! TokenRequest handler → insert_new("token_<hex>", blob)
//! ChargeRequest handler → get("token_<hex>") → blob
//! Ingestion loop        → put("lastBlock_<Topic>", "<decimal>") per topic
//!                         put("lastBlock", "<decimal>") minimum over topics
//! ```
//!
//! # Design Decisions
//! - Embedded ordered KV store (sled); this process is the only writer
//! - Token keys are create-only; the checkpoint key is overwritten each cycle
//! - No multi-key transactions; the dispatcher serializes access

pub mod store;

use thiserror::Error;

use crate::crypto::TokenId;

pub use store::TokenVault;

/// Key holding the ingestion checkpoint.
pub const CHECKPOINT_KEY: &str = "lastBlock";

/// Vault key for one topic's ingestion cursor.
pub fn cursor_key(topic: &str) -> String {
    format!("{}_{}", CHECKPOINT_KEY, topic)
}

/// Prefix of every card blob key.
pub const TOKEN_KEY_PREFIX: &str = "token_";

/// Vault key for a token id: `"token_" + lowercase hex`, no `0x`.
pub fn token_key(token_id: &TokenId) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, alloy::hex::encode(token_id))
}

/// A single key/value write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultWrite {
    pub key: String,
    pub value: Vec<u8>,
}

impl VaultWrite {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No value under the key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Create-only write hit an existing key.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// A stored value could not be interpreted.
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Underlying store failure.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
