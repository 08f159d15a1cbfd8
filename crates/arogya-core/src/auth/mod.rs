//! Authentication module for managing the user session and its storage.
//!
//! This module provides:
//! - `SessionStore`: Persistent key-value storage for the credential pair,
//!   the cached profile and the language preference
//! - `KeyringStore`: Keeps the credential pair in the OS keychain
//! - `AuthContext`: Who is signed in, restored at startup
//!
//! A partially written or corrupt session is treated as logged out and
//! wiped on startup.

pub mod credentials;
pub mod session;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

pub use credentials::KeyringStore;
pub use session::{AuthContext, LoginOutcome};
pub use store::{FileStore, MemoryStore, SessionStore, StoreKey};

use crate::config::CredentialBackend;

/// Open the store selected by the configuration.
pub fn open_store(backend: CredentialBackend, data_dir: PathBuf) -> Arc<dyn SessionStore> {
    let files = FileStore::new(data_dir);
    match backend {
        CredentialBackend::File => Arc::new(files),
        CredentialBackend::Keyring => Arc::new(KeyringStore::new(files)),
    }
}
