use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::paths::{key_path, tmp_path};

/// File-backed JSON key-value store for session state.
///
/// One document per key under the configured root directory. The store is a
/// thin handle; cloning it is cheap and all clones observe the same files.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    root: PathBuf,
}

impl SessionStorage {
    /// Create a storage handle rooted at the given folder.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create storage root '{}'", root.display()))?;
        Ok(Self { root })
    }

    /// Return the configured root folder.
    pub fn root_path(&self) -> &PathBuf { &self.root }

    /// Serialize `value` to JSON and write it under `key`.
    ///
    /// The document is written to a temp file and renamed into place so the
    /// on-disk state is never partially written.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).context("failed to serialize value")?;
        let tmp = tmp_path(&self.root, key);
        let path = key_path(&self.root, key);
        fs::write(&tmp, &bytes)
            .with_context(|| format!("failed to write '{}'", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to commit '{}'", path.display()))?;
        debug!(target: "mediconnect::storage", "put: key='{}' bytes={}", key, bytes.len());
        Ok(())
    }

    /// Read and deserialize the document under `key`.
    ///
    /// A missing file is `Ok(None)`. Read or parse failures are returned as
    /// errors; the caller decides whether they are fatal (the session store's
    /// startup path treats them as "no session").
    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = key_path(&self.root, key);
        if !path.exists() { return Ok(None); }
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let value = serde_json::from_slice::<T>(&bytes)
            .with_context(|| format!("failed to parse '{}'", path.display()))?;
        Ok(Some(value))
    }

    /// Remove the document under `key`. Returns true if it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = key_path(&self.root, key);
        if !path.exists() { return Ok(false); }
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove '{}'", path.display()))?;
        debug!(target: "mediconnect::storage", "remove: key='{}'", key);
        Ok(true)
    }

    pub fn exists(&self, key: &str) -> bool { key_path(&self.root, key).exists() }
}
