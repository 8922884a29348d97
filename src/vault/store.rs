//! sled-backed vault storage.

use std::path::Path;

use crate::crypto::TokenId;
use crate::observability::metrics;
use crate::vault::{cursor_key, token_key, VaultError, VaultResult, VaultWrite, CHECKPOINT_KEY};

/// Persistent store for encrypted card blobs and the ingestion checkpoint.
///
/// Cheap to clone; clones share the same database handle.
#[derive(Clone)]
pub struct TokenVault {
    db: sled::Db,
}

impl TokenVault {
    /// Open (or create) a vault at `path`.
    pub fn open(path: impl AsRef<Path>) -> VaultResult<Self> {
        let db = sled::open(path.as_ref())?;
        tracing::info!(
            path = %path.as_ref().display(),
            entries = db.len(),
            "Token vault opened"
        );
        Ok(Self { db })
    }

    /// In-memory vault that is discarded on drop. Used by tests.
    pub fn temporary() -> VaultResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Read the value under `key`.
    pub fn get(&self, key: &str) -> VaultResult<Vec<u8>> {
        self.db
            .get(key.as_bytes())?
            .map(|v| v.to_vec())
            .ok_or_else(|| VaultError::NotFound(key.to_string()))
    }

    /// Write a value, replacing any previous one.
    pub fn put(&self, write: VaultWrite) -> VaultResult<()> {
        self.db.insert(write.key.as_bytes(), write.value)?;
        Ok(())
    }

    /// Write a value only if the key is absent. First writer wins.
    pub fn insert_new(&self, write: VaultWrite) -> VaultResult<()> {
        match self
            .db
            .compare_and_swap(write.key.as_bytes(), None as Option<&[u8]>, Some(write.value))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(VaultError::KeyExists(write.key)),
        }
    }

    /// Delete `key`. Returns whether a value was present.
    pub fn remove(&self, key: &str) -> VaultResult<bool> {
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    /// Store an encrypted card blob under a fresh token id.
    pub fn store_token(&self, token_id: &TokenId, blob: &[u8]) -> VaultResult<()> {
        self.insert_new(VaultWrite::new(token_key(token_id), blob))
    }

    /// Load the encrypted card blob for a token id.
    pub fn load_token(&self, token_id: &TokenId) -> VaultResult<Vec<u8>> {
        self.get(&token_key(token_id))
    }

    /// Read the ingestion checkpoint, if one was ever written.
    pub fn load_checkpoint(&self) -> VaultResult<Option<u64>> {
        self.load_block(CHECKPOINT_KEY)
    }

    /// Persist the ingestion checkpoint as a decimal string.
    pub fn store_checkpoint(&self, block: u64) -> VaultResult<()> {
        self.put(VaultWrite::new(CHECKPOINT_KEY, block.to_string()))?;
        metrics::record_checkpoint(block);
        Ok(())
    }

    /// Read the last delivered block for one event topic.
    pub fn load_cursor(&self, topic: &str) -> VaultResult<Option<u64>> {
        self.load_block(&cursor_key(topic))
    }

    /// Persist the last delivered block for one event topic.
    pub fn store_cursor(&self, topic: &str, block: u64) -> VaultResult<()> {
        self.put(VaultWrite::new(cursor_key(topic), block.to_string()))
    }

    fn load_block(&self, key: &str) -> VaultResult<Option<u64>> {
        let raw = match self.get(key) {
            Ok(raw) => raw,
            Err(VaultError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let corrupt = |reason: String| VaultError::Corrupt {
            key: key.to_string(),
            reason,
        };
        let text = String::from_utf8(raw).map_err(|e| corrupt(e.to_string()))?;
        text.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| corrupt(e.to_string()))
    }

    /// Number of vaulted card blobs.
    pub fn token_count(&self) -> usize {
        self.db.scan_prefix(crate::vault::TOKEN_KEY_PREFIX.as_bytes()).count()
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> VaultResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("entries", &self.db.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_token_id;

    #[test]
    fn test_token_round_trip() {
        let vault = TokenVault::temporary().unwrap();
        let id = generate_token_id();
        let blob = vec![4u8; 97];

        vault.store_token(&id, &blob).unwrap();
        assert_eq!(vault.load_token(&id).unwrap(), blob);
        assert_eq!(vault.token_count(), 1);
    }

    #[test]
    fn test_first_writer_wins() {
        let vault = TokenVault::temporary().unwrap();
        let id = generate_token_id();

        vault.store_token(&id, b"first").unwrap();
        let err = vault.store_token(&id, b"second").unwrap_err();
        assert!(matches!(err, VaultError::KeyExists(_)));
        assert_eq!(vault.load_token(&id).unwrap(), b"first");
    }

    #[test]
    fn test_missing_token() {
        let vault = TokenVault::temporary().unwrap();
        let err = vault.load_token(&generate_token_id()).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(key) if key.starts_with("token_")));
    }

    #[test]
    fn test_checkpoint_persistence() {
        let vault = TokenVault::temporary().unwrap();
        assert_eq!(vault.load_checkpoint().unwrap(), None);

        vault.store_checkpoint(41).unwrap();
        vault.store_checkpoint(42).unwrap();
        assert_eq!(vault.load_checkpoint().unwrap(), Some(42));
        assert_eq!(vault.get(CHECKPOINT_KEY).unwrap(), b"42");
    }

    #[test]
    fn test_corrupt_checkpoint() {
        let vault = TokenVault::temporary().unwrap();
        vault.put(VaultWrite::new(CHECKPOINT_KEY, "not-a-number")).unwrap();
        assert!(matches!(
            vault.load_checkpoint(),
            Err(VaultError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let vault = TokenVault::temporary().unwrap();
        vault.put(VaultWrite::new("k", "v")).unwrap();
        assert!(vault.remove("k").unwrap());
        assert!(!vault.remove("k").unwrap());
    }

    #[test]
    fn test_cursors_are_per_topic() {
        let vault = TokenVault::temporary().unwrap();
        assert_eq!(vault.load_cursor("TokenRequest").unwrap(), None);

        vault.store_cursor("TokenRequest", 90).unwrap();
        vault.store_cursor("ChargeRequest", 120).unwrap();
        assert_eq!(vault.load_cursor("TokenRequest").unwrap(), Some(90));
        assert_eq!(vault.load_cursor("ChargeRequest").unwrap(), Some(120));
        assert_eq!(vault.load_checkpoint().unwrap(), None);

        vault.put(VaultWrite::new(cursor_key("ChargeRequest"), "x")).unwrap();
        assert!(matches!(
            vault.load_cursor("ChargeRequest"),
            Err(VaultError::Corrupt { key, .. }) if key == "lastBlock_ChargeRequest"
        ));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = std::env::temp_dir().join(format!(
            "card-bridge-vault-{}-{:016x}",
            std::process::id(),
            rand::random::<u64>()
        ));
        {
            let vault = TokenVault::open(&dir).unwrap();
            vault.store_checkpoint(7).unwrap();
            vault.db.flush().unwrap();
        }
        let reopened = TokenVault::open(&dir).map(|vault| vault.load_checkpoint());
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(reopened.unwrap().unwrap(), Some(7));
    }
}
