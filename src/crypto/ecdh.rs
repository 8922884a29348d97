//! Elliptic-curve Diffie-Hellman over secp256k1.
//!
//! The shared key is SHA-256 over the compressed encoding of the shared point
//! (`0x02 | y-parity` followed by the x coordinate), which is the default
//! hash used by libsecp256k1's ECDH module. Client applications derive the
//! same 32 bytes from their ephemeral private key and the server public key.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};

use crate::crypto::{CryptoError, CryptoResult};

/// Environment variable holding the server ECDH private key.
pub const SERVER_KEY_ENV_VAR: &str = "BRIDGE_SERVER_PRIVATE_KEY";

/// Length of an uncompressed SEC1 public key.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// 32-byte symmetric key derived from an ECDH exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// The bridge's long-lived ECDH key.
#[derive(Clone)]
pub struct ServerKey {
    secret: SecretKey,
}

impl ServerKey {
    /// Parse a hex-encoded private key (with or without `0x`, surrounding whitespace ignored).
    pub fn from_hex(private_key_hex: &str) -> CryptoResult<Self> {
        let trimmed = private_key_hex.trim();
        let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = alloy::hex::decode(key_hex)
            .map_err(|e| CryptoError::InvalidServerKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Build from a raw 32-byte scalar.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidServerKey(e.to_string()))?;
        Ok(Self { secret })
    }

    /// Load from `BRIDGE_SERVER_PRIVATE_KEY`, falling back to a hex key file.
    pub fn from_env_or_file(key_path: Option<&std::path::Path>) -> CryptoResult<Self> {
        if let Ok(hex) = std::env::var(SERVER_KEY_ENV_VAR) {
            return Self::from_hex(&hex);
        }
        let path = key_path.ok_or_else(|| {
            CryptoError::InvalidServerKey(format!(
                "{} not set and no key file configured",
                SERVER_KEY_ENV_VAR
            ))
        })?;
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CryptoError::InvalidServerKey(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_hex(&contents)
    }

    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self {
            secret: SecretKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Uncompressed SEC1 public key, as published by `getBackendPubKey`.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("public_key", &alloy::hex::encode(self.public_key_bytes()))
            .finish()
    }
}

/// Parse a 65-byte uncompressed peer key, rejecting anything off the curve.
pub fn parse_peer_key(peer_public_key: &[u8]) -> CryptoResult<PublicKey> {
    if peer_public_key.len() != UNCOMPRESSED_KEY_LEN || peer_public_key[0] != 0x04 {
        return Err(CryptoError::InvalidPeerKey(format!(
            "expected {} byte uncompressed key, got {} bytes",
            UNCOMPRESSED_KEY_LEN,
            peer_public_key.len()
        )));
    }
    PublicKey::from_sec1_bytes(peer_public_key)
        .map_err(|_| CryptoError::InvalidPeerKey("point is not on secp256k1".to_string()))
}

/// Derive the shared symmetric key between `secret` and a peer public key.
pub fn derive_shared_secret(
    secret: &SecretKey,
    peer_public_key: &[u8],
) -> CryptoResult<SharedKey> {
    let peer = parse_peer_key(peer_public_key)?;
    let point = (peer.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    let compressed = point.to_encoded_point(true);
    let digest = Sha256::digest(compressed.as_bytes());
    Ok(SharedKey(digest.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_is_symmetric() {
        let server = ServerKey::random();
        let client = ServerKey::random();

        let a = derive_shared_secret(server.secret(), &client.public_key_bytes()).unwrap();
        let b = derive_shared_secret(client.secret(), &server.public_key_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_off_curve_point() {
        let server = ServerKey::random();
        let mut bogus = vec![0x04u8];
        bogus.extend_from_slice(&[0x11; 64]);

        let err = derive_shared_secret(server.secret(), &bogus).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPeerKey(_)));
    }

    #[test]
    fn test_rejects_compressed_key() {
        let server = ServerKey::random();
        let client = ServerKey::random();
        let compressed = client
            .secret()
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        let err = derive_shared_secret(server.secret(), &compressed).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPeerKey(_)));
    }

    #[test]
    fn test_server_key_from_hex() {
        const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let plain = ServerKey::from_hex(KEY).unwrap();
        let prefixed = ServerKey::from_hex(&format!("0x{}\n", KEY)).unwrap();
        assert_eq!(plain.public_key_bytes(), prefixed.public_key_bytes());
        assert_eq!(plain.public_key_bytes().len(), UNCOMPRESSED_KEY_LEN);

        assert!(ServerKey::from_hex("not-hex").is_err());
        assert!(ServerKey::from_bytes(&[0u8; 32]).is_err());
    }
}
