use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Session store file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Entries the client keeps across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Credential,
    RefreshCredential,
    Profile,
    Language,
}

impl StoreKey {
    pub const ALL: [StoreKey; 4] = [
        StoreKey::Credential,
        StoreKey::RefreshCredential,
        StoreKey::Profile,
        StoreKey::Language,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Credential => "authToken",
            StoreKey::RefreshCredential => "refreshToken",
            StoreKey::Profile => "userData",
            StoreKey::Language => "language",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, StoreKey::Credential | StoreKey::RefreshCredential)
    }
}

/// Persistent key-value store surviving restarts. Methods are synchronous
/// and are called while the client holds its credential lock.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>>;

    fn set(&self, key: StoreKey, value: &str) -> Result<()>;

    fn remove(&self, key: StoreKey) -> Result<()>;

    /// Remove several entries. Backends that can do it in one write
    /// override this so a partial clear is never observable.
    fn remove_many(&self, keys: &[StoreKey]) -> Result<()> {
        for key in keys {
            self.remove(*key)?;
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.remove_many(&StoreKey::ALL)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// JSON-file backed store in the application data directory.
///
/// Reads and writes use blocking `std::fs` calls and run inline on the
/// calling task. The file is a few hundred bytes, which is fine for the
/// CLI; a long-running front end sharing a runtime with other work should
/// wrap its own store in `tokio::task::spawn_blocking`.
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn read(&self) -> Result<StoreFile> {
        let path = self.path();
        if !path.exists() {
            return Ok(StoreFile::default());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn write(&self, mut file: StoreFile) -> Result<()> {
        let path = self.path();
        if file.entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove session file")?;
            }
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        file.updated_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }

    /// Read-modify-write under the store lock. An unreadable file is
    /// replaced rather than blocking every later write.
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = match self.read() {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session file");
                StoreFile::default()
            }
        };
        apply(&mut file.entries);
        self.write(file)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.entries.get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.update(|entries| {
            entries.remove(key.as_str());
        })
    }

    fn remove_many(&self, keys: &[StoreKey]) -> Result<()> {
        self.update(|entries| {
            for key in keys {
                entries.remove(key.as_str());
            }
        })
    }
}

/// Process-local store, for tests and `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&key);
        Ok(())
    }

    fn remove_many(&self, keys: &[StoreKey]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}
