//! Opt-in registry - persistent JSON storage for recipient ids
//!
//! The registry file holds a JSON array of recipient id strings. Every
//! mutation rewrites the whole file. All access from async code goes through
//! [`SharedRegistry`], which serializes readers and writers behind one lock.

use crate::config::Config;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

/// Set of opted-in recipient ids
pub type Members = BTreeSet<String>;

/// File-backed store for the opt-in registry
#[derive(Debug, Clone)]
pub struct RecipientRegistry {
    registry_path: PathBuf,
}

impl RecipientRegistry {
    pub fn new(config: &Config) -> Self {
        Self::with_path(config.registry_file.clone())
    }

    pub fn with_path(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.registry_path
    }

    /// Read the registry, surfacing I/O and parse errors
    fn read(&self) -> Result<Members> {
        if !self.registry_path.exists() {
            return Ok(Members::new());
        }

        let content = fs::read_to_string(&self.registry_path)?;
        let ids: Vec<String> = serde_json::from_str(&content)?;
        Ok(ids.into_iter().collect())
    }

    /// Load registry from disk. A missing or unreadable file yields an empty set.
    pub fn load(&self) -> Members {
        match self.read() {
            Ok(members) => members,
            Err(e) => {
                error!(
                    "Failed to load registry {}, treating as empty: {}",
                    self.registry_path.display(),
                    e
                );
                Members::new()
            }
        }
    }

    /// Save registry to disk atomically, replacing whatever was there
    pub fn save(&self, members: &Members) -> Result<()> {
        self.write(members).map_err(|e| {
            error!(
                "Failed to save registry {}: {}",
                self.registry_path.display(),
                e
            );
            e
        })
    }

    fn write(&self, members: &Members) -> Result<()> {
        // Ensure parent directory exists
        let parent = match self.registry_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Write to temp file in same directory (for atomic rename)
        let mut temp = NamedTempFile::new_in(parent)?;

        let ids: Vec<&String> = members.iter().collect();
        let json = serde_json::to_string_pretty(&ids)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;

        temp.persist(&self.registry_path)
            .map_err(|e| Error::Io(e.error))?;

        Ok(())
    }

    /// Register a recipient. Returns `true` if the id was not already present.
    pub fn add(&self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Err(Error::InvalidRecipient(id.to_string()));
        }

        // Unlike load(), a corrupt file must not be overwritten
        let mut members = self.read().map_err(|e| {
            error!(
                "Refusing to register {}: registry {} unreadable: {}",
                id,
                self.registry_path.display(),
                e
            );
            e
        })?;
        if members.contains(id) {
            return Ok(false);
        }

        members.insert(id.to_string());
        self.save(&members)?;
        info!("Registered recipient {} ({} total)", id, members.len());

        Ok(true)
    }
}

/// Registry handle shared between webhook handlers and the daily job.
///
/// Every operation takes the lock for its whole load-mutate-save sequence and
/// runs the file I/O on the blocking pool.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<RecipientRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: RecipientRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    pub async fn load(&self) -> Result<Members> {
        self.with_store(|store| Ok(store.load())).await
    }

    pub async fn save(&self, members: Members) -> Result<()> {
        self.with_store(move |store| store.save(&members)).await
    }

    pub async fn add(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_store(move |store| store.add(&id)).await
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecipientRegistry) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let store = inner.lock().map_err(|_| {
                warn!("Registry lock poisoned");
                Error::LockPoisoned
            })?;
            f(&store)
        })
        .await?
    }
}
