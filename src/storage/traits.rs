//! Abstract storage traits for the fund registry.
//!
//! The registry keeps its working set in memory and talks to a store only at
//! run boundaries: `load` at open, writes plus `sync` at flush.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::fund::{Alias, CanonicalFund, GpAlias};

/// Complete persisted state of a registry.
///
/// Funds are kept in creation order; rebuilding a registry from a snapshot
/// preserves tie-breaking between equally similar candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Funds in creation order.
    #[serde(default)]
    pub funds: Vec<CanonicalFund>,
    /// All aliases.
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Learned GP aliases.
    #[serde(default)]
    pub gp_aliases: Vec<GpAlias>,
}

impl RegistrySnapshot {
    /// Returns true if the snapshot holds no funds, aliases or GP aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.funds.is_empty() && self.aliases.is_empty() && self.gp_aliases.is_empty()
    }
}

/// Storage trait for registry state.
///
/// # Uniqueness
/// - An alias is unique per (normalized raw name, source). Inserting the same
///   key for the same fund is a no-op; for a different fund it is rejected.
/// - A GP alias spelling maps to exactly one canonical GP name.
pub trait RegistryStore: Send + Sync {
    /// Load everything, funds in creation order.
    fn load(&self) -> Result<RegistrySnapshot, StorageError>;

    /// Insert a fund, or replace the stored copy with the same ID.
    fn upsert_fund(&self, fund: &CanonicalFund) -> Result<(), StorageError>;

    /// Insert an alias.
    ///
    /// # Errors
    /// - `DuplicateKey`: the key already maps to a different fund
    /// - `FundNotFound`: the alias points at a fund the store does not hold
    fn insert_alias(&self, alias: &Alias) -> Result<(), StorageError>;

    /// Point an existing alias at a different fund (manual correction).
    ///
    /// Inserts the alias if the key is unknown.
    fn repoint_alias(&self, alias: &Alias) -> Result<(), StorageError>;

    /// Insert a GP alias. Returns `DuplicateKey` on a conflicting mapping.
    fn insert_gp_alias(&self, gp_alias: &GpAlias) -> Result<(), StorageError>;

    /// Make prior writes durable. No-op for volatile stores.
    fn sync(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
