//! Token identifiers and card identity hashing.

use alloy::primitives::B256;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::processor::types::CardData;

/// Opaque 32-byte reference to a vaulted card.
pub type TokenId = B256;

/// Generate a token id: SHA-256 over 64 bytes from the OS RNG.
pub fn generate_token_id() -> TokenId {
    let mut seed = [0u8; 64];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    B256::from(<[u8; 32]>::from(Sha256::digest(seed)))
}

/// Hash binding a token to a card identity without revealing it.
///
/// `sha256(cardNumber || expMonth || expYear)`; the CVV is not part of it.
pub fn card_hash(card: &CardData) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(card.card_number.as_bytes());
    hasher.update(card.exp_month.as_bytes());
    hasher.update(card.exp_year.as_bytes());
    B256::from(<[u8; 32]>::from(hasher.finalize()))
}
