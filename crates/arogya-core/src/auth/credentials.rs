use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::store::{SessionStore, StoreKey};

const SERVICE_NAME: &str = "arogya-mitra";

/// Keeps the credential pair in the OS keychain and everything else in
/// the wrapped store.
pub struct KeyringStore<S> {
    fallback: S,
}

impl<S: SessionStore> KeyringStore<S> {
    pub fn new(fallback: S) -> Self {
        Self { fallback }
    }

    fn entry(key: StoreKey) -> Result<Entry> {
        Entry::new(SERVICE_NAME, key.as_str()).context("Failed to create keyring entry")
    }
}

impl<S: SessionStore> SessionStore for KeyringStore<S> {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        if !key.is_secret() {
            return self.fallback.get(key);
        }
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        if !key.is_secret() {
            return self.fallback.set(key, value);
        }
        Self::entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        if !key.is_secret() {
            return self.fallback.remove(key);
        }
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    fn remove_many(&self, keys: &[StoreKey]) -> Result<()> {
        remove_split(keys, &self.fallback, |key| self.remove(key))
    }
}

/// Clear the plain keys in one write, then every secret. A failing secret
/// does not stop the others; the first error is returned.
fn remove_split(
    keys: &[StoreKey],
    fallback: &dyn SessionStore,
    mut remove_secret: impl FnMut(StoreKey) -> Result<()>,
) -> Result<()> {
    let (secrets, plain): (Vec<StoreKey>, Vec<StoreKey>) =
        keys.iter().copied().partition(|key| key.is_secret());
    let mut result = fallback.remove_many(&plain);
    for key in secrets {
        if let Err(e) = remove_secret(key) {
            warn!(key = key.as_str(), error = %e, "Failed to remove credential");
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}
