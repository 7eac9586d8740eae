use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use super::store::KeyValueStore;

const SERVICE_NAME: &str = "keyhold";

/// Session entries kept in the OS keychain, one credential per key.
///
/// The keychain gives no change notification, so other processes only see
/// updates on their next explicit reload.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve entry from keychain"),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store entry in keychain")?;
        debug!(key = key, "Keychain entry stored");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete entry from keychain"),
        }
    }
}
