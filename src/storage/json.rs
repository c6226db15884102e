//! JSON snapshot file backend.
//!
//! Writes go to an in-memory working copy; `sync` serializes the whole
//! registry to a temp file next to the target and renames it into place, so
//! a crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::fund::{Alias, CanonicalFund, GpAlias};
use crate::storage::memory::InMemoryRegistryStore;
use crate::storage::traits::{RegistrySnapshot, RegistryStore};

/// Registry store persisted as one pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryRegistryStore,
}

impl JsonFileStore {
    /// Opens a snapshot file, starting empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, `Serialization` if
    /// it is not a valid snapshot, and `DuplicateKey`/`FundNotFound` if its
    /// content violates uniqueness.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: RegistrySnapshot = serde_json::from_slice(&bytes)?;
            InMemoryRegistryStore::from_snapshot(&snapshot)?
        } else {
            InMemoryRegistryStore::new()
        };
        Ok(Self { path, inner })
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<RegistrySnapshot, StorageError> {
        self.inner.load()
    }

    fn upsert_fund(&self, fund: &CanonicalFund) -> Result<(), StorageError> {
        self.inner.upsert_fund(fund)
    }

    fn insert_alias(&self, alias: &Alias) -> Result<(), StorageError> {
        self.inner.insert_alias(alias)
    }

    fn repoint_alias(&self, alias: &Alias) -> Result<(), StorageError> {
        self.inner.repoint_alias(alias)
    }

    fn insert_gp_alias(&self, gp_alias: &GpAlias) -> Result<(), StorageError> {
        self.inner.insert_gp_alias(gp_alias)
    }

    fn sync(&self) -> Result<(), StorageError> {
        let snapshot = self.inner.load()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
