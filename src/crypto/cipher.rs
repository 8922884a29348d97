//! Symmetric ciphers for card payloads.
//!
//! CBC is the wire format clients use today. The GCM pair exists for clients
//! that move to authenticated encryption; it carries its 12-byte nonce in
//! front of the sealed bytes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::crypto::{CryptoError, CryptoResult, SharedKey};

/// AES block size; also the CBC IV length.
pub const BLOCK_SIZE: usize = 16;

/// GCM nonce length.
pub const GCM_NONCE_LEN: usize = 12;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Decrypt AES-256-CBC ciphertext and strip PKCS#7 padding.
pub fn decrypt_cbc(ciphertext: &[u8], key: &SharedKey, iv: &[u8]) -> CryptoResult<Vec<u8>> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::Malformed(format!(
            "IV must be {} bytes, got {}",
            BLOCK_SIZE,
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Malformed(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}

/// Encrypt with AES-256-CBC and PKCS#7 padding.
pub fn encrypt_cbc(plaintext: &[u8], key: &SharedKey, iv: &[u8]) -> CryptoResult<Vec<u8>> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::Malformed(format!(
            "IV must be {} bytes, got {}",
            BLOCK_SIZE,
            iv.len()
        )));
    }
    let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Seal with AES-256-GCM. Output is `nonce || ciphertext || tag`.
pub fn encrypt_gcm(
    plaintext: &[u8],
    key: &SharedKey,
    nonce: &[u8; GCM_NONCE_LEN],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Authentication)?;

    let mut out = Vec::with_capacity(GCM_NONCE_LEN + sealed.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a nonce-prefixed AES-256-GCM payload.
pub fn decrypt_gcm(sealed: &[u8], key: &SharedKey) -> CryptoResult<Vec<u8>> {
    if sealed.len() < GCM_NONCE_LEN {
        return Err(CryptoError::Malformed(format!(
            "sealed payload shorter than {} byte nonce",
            GCM_NONCE_LEN
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(GCM_NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}
