//! Encrypted card blob layout.
//!
//! ```text
//! [65-byte uncompressed client ephemeral public key][16-byte IV][AES-256-CBC ciphertext]
//! ```
//!
//! The blob is stored verbatim in the vault, so a record whose key prefix does
//! not parse is corrupt and must surface as an error.

use crate::crypto::cipher::{decrypt_cbc, encrypt_cbc, BLOCK_SIZE};
use crate::crypto::ecdh::{derive_shared_secret, parse_peer_key, UNCOMPRESSED_KEY_LEN};
use crate::crypto::{CryptoError, CryptoResult, ServerKey};

/// Borrowed view over an encrypted card blob.
#[derive(Debug, Clone, Copy)]
pub struct CardEnvelope<'a> {
    /// Client ephemeral public key (uncompressed SEC1).
    pub client_public_key: &'a [u8],
    /// CBC initialization vector.
    pub iv: &'a [u8],
    /// Padded ciphertext.
    pub ciphertext: &'a [u8],
}

impl<'a> CardEnvelope<'a> {
    /// Minimum length of a blob holding at least one cipher block.
    pub const MIN_LEN: usize = UNCOMPRESSED_KEY_LEN + BLOCK_SIZE + BLOCK_SIZE;

    /// Split a blob into its parts, validating the embedded public key.
    pub fn parse(blob: &'a [u8]) -> CryptoResult<Self> {
        if blob.len() < Self::MIN_LEN {
            return Err(CryptoError::Malformed(format!(
                "card blob is {} bytes, need at least {}",
                blob.len(),
                Self::MIN_LEN
            )));
        }
        let (client_public_key, rest) = blob.split_at(UNCOMPRESSED_KEY_LEN);
        parse_peer_key(client_public_key)?;
        let (iv, ciphertext) = rest.split_at(BLOCK_SIZE);
        Ok(Self {
            client_public_key,
            iv,
            ciphertext,
        })
    }
}

/// Decrypt a card blob with the server key.
pub fn open_card_blob(blob: &[u8], server_key: &ServerKey) -> CryptoResult<Vec<u8>> {
    let envelope = CardEnvelope::parse(blob)?;
    let shared = derive_shared_secret(server_key.secret(), envelope.client_public_key)?;
    decrypt_cbc(envelope.ciphertext, &shared, envelope.iv)
}

/// Client-side encryption: seal `plaintext` for the holder of `server_public_key`.
///
/// Uses a fresh ephemeral key; the caller picks the IV.
pub fn seal_card_blob(
    server_public_key: &[u8],
    plaintext: &[u8],
    iv: &[u8; BLOCK_SIZE],
) -> CryptoResult<Vec<u8>> {
    let ephemeral = ServerKey::random();
    let shared = derive_shared_secret(ephemeral.secret(), server_public_key)?;
    let ciphertext = encrypt_cbc(plaintext, &shared, iv)?;

    let mut blob = ephemeral.public_key_bytes();
    blob.extend_from_slice(iv);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}
