//! OS keychain credential store.
//!
//! Uses the `keyring` crate (macOS Keychain, Windows Credential Manager,
//! Linux kernel keyutils). The storage key becomes the keychain username.
//! Platform calls can block, so each one runs on tokio's blocking pool.

use keyring::Entry;

use super::{CredentialStore, StorageError};

/// Keychain service name shared by every entry this client writes.
pub const SERVICE_NAME: &str = "forensic-client";

impl From<keyring::Error> for StorageError {
    fn from(err: keyring::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Owned `(service, key)` pair for a blocking task.
    fn entry(&self, key: &str) -> (String, String) {
        (self.service.clone(), key.to_string())
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

/// Run a synchronous keychain call off the async worker threads.
async fn run_blocking<R, F>(f: F) -> Result<R, StorageError>
where
    F: FnOnce() -> Result<R, StorageError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Backend(format!("keychain task failed: {}", e)))?
}

impl CredentialStore for KeychainStore {
    /// Returns `None` if no entry exists (never logged in, or logged out).
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let (service, key) = self.entry(key);
        run_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(StorageError::from(e)),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (service, key) = self.entry(key);
        let value = value.to_string();
        run_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            entry.set_password(&value)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let (service, key) = self.entry(key);
        run_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            match entry.delete_credential() {
                Ok(()) => Ok(()),
                Err(keyring::Error::NoEntry) => Ok(()), // already gone
                Err(e) => Err(StorageError::from(e)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        assert_eq!(KeychainStore::default().service(), SERVICE_NAME);
    }

    #[test]
    fn test_keyring_error_maps_to_backend() {
        let err = StorageError::from(keyring::Error::NoEntry);
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn test_run_blocking_leaves_async_thread() {
        let caller = std::thread::current().id();
        let worker = run_blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);

        let err = run_blocking::<(), _>(|| Err(StorageError::Backend("locked".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(msg) if msg == "locked"));
    }

    #[tokio::test]
    async fn test_run_blocking_panic_maps_to_backend() {
        let err = run_blocking::<(), _>(|| panic!("keychain daemon crashed"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(msg) if msg.starts_with("keychain task failed")));
    }
}
