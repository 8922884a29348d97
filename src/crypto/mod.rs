//! Card envelope cryptography.
//!
//! # Data Flow
//! ```text
//! EncryptedCardBlob (from TokenRequest event or vault)
//!     → envelope.rs (split: 65-byte client key | 16-byte IV | ciphertext)
//!     → ecdh.rs (secp256k1 shared secret, hashed to 32 bytes)
//!     → cipher.rs (AES-256-CBC + PKCS#7, or AES-256-GCM)
//!     → plaintext CardData JSON (memory only)
//! ```
//!
//! # Security Constraints
//! - Plaintext card data never leaves the handler that decrypted it
//! - Every failure here is final for the event: no retries, no side effects
//! - Server private key is loaded from the environment or a key file, never logged

pub mod cipher;
pub mod ecdh;
pub mod envelope;
pub mod token;

use thiserror::Error;

pub use ecdh::{derive_shared_secret, ServerKey, SharedKey};
pub use envelope::{open_card_blob, seal_card_blob, CardEnvelope};
pub use token::{card_hash, generate_token_id, TokenId};

/// Errors raised by the crypto pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Peer public key is not a 65-byte uncompressed point on secp256k1.
    #[error("invalid peer public key: {0}")]
    InvalidPeerKey(String),

    /// Server private key is not a valid secp256k1 scalar.
    #[error("invalid server private key: {0}")]
    InvalidServerKey(String),

    /// PKCS#7 padding check failed after CBC decryption.
    #[error("invalid padding")]
    InvalidPadding,

    /// Input lengths do not fit the cipher or envelope layout.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// GCM tag verification failed.
    #[error("authentication failed")]
    Authentication,
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
