//! Persistent credential storage.
//!
//! The session token lives in a device-local key-value store. The API client
//! only ever reads it; the session layer writes it at login and removes it at
//! logout. Stores are injected, so tests can substitute [`MemoryStore`].

pub mod file;
pub mod keychain;

pub use file::FileStore;
pub use keychain::KeychainStore;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Keychain operation failed: {0}")]
    Backend(String),
    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// Async key-value store holding the session credential.
///
/// `remove` must be idempotent: removing a missing key is not an error.
#[allow(async_fn_in_trait)]
pub trait CredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: CredentialStore> CredentialStore for &S {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}

impl<S: CredentialStore> CredentialStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}

/// In-memory store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a single entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.to_string());
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Which backend holds the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Keychain,
    File,
    Memory,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Keychain => "keychain",
            StoreKind::File => "file",
            StoreKind::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" | "keyring" => Ok(StoreKind::Keychain),
            "file" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!(
                "unknown credential store '{}' (expected keychain, file or memory)",
                other
            )),
        }
    }
}

/// A store chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Keychain(KeychainStore),
    File(FileStore),
    Memory(MemoryStore),
}

impl AnyStore {
    /// Open the default store of the given kind.
    pub fn open(kind: StoreKind) -> Result<Self, StorageError> {
        Ok(match kind {
            StoreKind::Keychain => AnyStore::Keychain(KeychainStore::default()),
            StoreKind::File => AnyStore::File(FileStore::default_location()?),
            StoreKind::Memory => AnyStore::Memory(MemoryStore::new()),
        })
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            AnyStore::Keychain(_) => StoreKind::Keychain,
            AnyStore::File(_) => StoreKind::File,
            AnyStore::Memory(_) => StoreKind::Memory,
        }
    }
}

impl CredentialStore for AnyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            AnyStore::Keychain(store) => store.get(key).await,
            AnyStore::File(store) => store.get(key).await,
            AnyStore::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            AnyStore::Keychain(store) => store.set(key, value).await,
            AnyStore::File(store) => store.set(key, value).await,
            AnyStore::Memory(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            AnyStore::Keychain(store) => store.remove(key).await,
            AnyStore::File(store) => store.remove(key).await,
            AnyStore::Memory(store) => store.remove(key).await,
        }
    }
}
