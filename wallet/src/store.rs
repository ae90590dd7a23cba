use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::WalletError;

/// Key holding the encrypted seed blob
pub const ENCRYPTED_SEED_KEY: &str = "encrypted_mnemonic";
/// Key holding the number of derived accounts
pub const ACCOUNT_COUNT_KEY: &str = "wallet_account_count";
/// Host-owned marker recording that the user saw the seed phrase
pub const SEED_SHOWN_KEY: &str = "mnemonic_shown";
/// Plaintext key written by very old builds; only ever deleted
pub const LEGACY_PLAINTEXT_KEY: &str = "mnemonic";

/// Durable string-keyed storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WalletError>;
    fn delete(&self, key: &str) -> Result<(), WalletError>;
}

/// Volatile store, used by tests and ephemeral hosts
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), WalletError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every change.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash leaves either the old or the new map, never a torn one.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at path, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice(&data).map_err(|e| {
                WalletError::Storage(format!("unreadable store {}: {}", path.display(), e))
            })?
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), "Opened wallet store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), WalletError> {
        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), WalletError> {
        let mut entries = self.entries.write();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.delete("missing").unwrap();
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("wallet.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set(ACCOUNT_COUNT_KEY, "3").unwrap();
            store.set(SEED_SHOWN_KEY, "true").unwrap();
            store.delete(SEED_SHOWN_KEY).unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(ACCOUNT_COUNT_KEY).unwrap().as_deref(), Some("3"));
        assert_eq!(reopened.get(SEED_SHOWN_KEY).unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(WalletError::Storage(_))));
    }
}
