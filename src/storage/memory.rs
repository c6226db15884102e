//! In-memory storage backend.
//!
//! Thread-safe reference implementation of [`RegistryStore`], used directly in
//! tests and embedded runs and as the working copy behind the JSON file store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StorageError;
use crate::fund::{Alias, AliasKey, CanonicalFund, FundId, GpAlias};
use crate::storage::traits::{RegistrySnapshot, RegistryStore};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Default)]
struct StoreState {
    funds: Vec<CanonicalFund>,
    fund_index: HashMap<FundId, usize>,
    aliases: Vec<Alias>,
    alias_index: HashMap<AliasKey, usize>,
    gp_aliases: Vec<GpAlias>,
    gp_index: HashMap<String, usize>,
}

impl StoreState {
    fn upsert_fund(&mut self, fund: &CanonicalFund) {
        if let Some(&idx) = self.fund_index.get(&fund.id) {
            self.funds[idx] = fund.clone();
        } else {
            self.fund_index.insert(fund.id, self.funds.len());
            self.funds.push(fund.clone());
        }
    }

    fn insert_alias(&mut self, alias: &Alias) -> Result<(), StorageError> {
        if !self.fund_index.contains_key(&alias.fund_id) {
            return Err(StorageError::FundNotFound(alias.fund_id));
        }
        let key = alias.key();
        if let Some(&idx) = self.alias_index.get(&key) {
            let existing = &self.aliases[idx];
            if existing.fund_id == alias.fund_id {
                return Ok(());
            }
            return Err(StorageError::DuplicateKey(format!(
                "alias {key} already maps to {}",
                existing.fund_id
            )));
        }
        self.alias_index.insert(key, self.aliases.len());
        self.aliases.push(alias.clone());
        Ok(())
    }

    fn repoint_alias(&mut self, alias: &Alias) -> Result<(), StorageError> {
        if !self.fund_index.contains_key(&alias.fund_id) {
            return Err(StorageError::FundNotFound(alias.fund_id));
        }
        let key = alias.key();
        if let Some(&idx) = self.alias_index.get(&key) {
            self.aliases[idx] = alias.clone();
        } else {
            self.alias_index.insert(key, self.aliases.len());
            self.aliases.push(alias.clone());
        }
        Ok(())
    }

    fn insert_gp_alias(&mut self, gp_alias: &GpAlias) -> Result<(), StorageError> {
        let key = normalize_key(&gp_alias.alias);
        if key.is_empty() {
            return Err(StorageError::BackendError(
                "GP alias must be non-empty".to_string(),
            ));
        }
        if let Some(&idx) = self.gp_index.get(&key) {
            let existing = &self.gp_aliases[idx];
            if normalize_key(&existing.canonical) == normalize_key(&gp_alias.canonical) {
                return Ok(());
            }
            return Err(StorageError::DuplicateKey(format!(
                "GP alias '{key}' already maps to '{}'",
                existing.canonical
            )));
        }
        self.gp_index.insert(key, self.gp_aliases.len());
        self.gp_aliases.push(gp_alias.clone());
        Ok(())
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            funds: self.funds.clone(),
            aliases: self.aliases.clone(),
            gp_aliases: self.gp_aliases.clone(),
        }
    }
}

/// In-memory registry store.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    state: RwLock<StoreState>,
}

impl InMemoryRegistryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` or `FundNotFound` if the snapshot violates the
    /// store's uniqueness rules.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Result<Self, StorageError> {
        let mut state = StoreState::default();
        for fund in &snapshot.funds {
            state.upsert_fund(fund);
        }
        for alias in &snapshot.aliases {
            state.insert_alias(alias)?;
        }
        for gp_alias in &snapshot.gp_aliases {
            state.insert_gp_alias(gp_alias)?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Number of stored funds.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn fund_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.fund_count"))?;
        Ok(state.funds.len())
    }

    /// Number of stored aliases.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn alias_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.alias_count"))?;
        Ok(state.aliases.len())
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn load(&self) -> Result<RegistrySnapshot, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.load"))?;
        Ok(state.snapshot())
    }

    fn upsert_fund(&self, fund: &CanonicalFund) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("store.upsert_fund"))?;
        state.upsert_fund(fund);
        Ok(())
    }

    fn insert_alias(&self, alias: &Alias) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("store.insert_alias"))?;
        state.insert_alias(alias)
    }

    fn repoint_alias(&self, alias: &Alias) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("store.repoint_alias"))?;
        state.repoint_alias(alias)
    }

    fn insert_gp_alias(&self, gp_alias: &GpAlias) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("store.insert_gp_alias"))?;
        state.insert_gp_alias(gp_alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    fn fund(name: &str) -> CanonicalFund {
        CanonicalFund {
            id: FundId::new(),
            display_name: name.to_string(),
            raw_name: name.to_string(),
            name_tokens: name.to_lowercase().split_whitespace().map(str::to_string).collect(),
            sequence_number: None,
            general_partner_raw: None,
            general_partner_key: None,
            vintage_year: None,
            asset_class: None,
            sub_strategy: None,
            seeded_by: "wsib".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let store = InMemoryRegistryStore::new();
        let mut f = fund("Acme Growth");
        store.upsert_fund(&f).unwrap();
        f.vintage_year = Some(2014);
        store.upsert_fund(&f).unwrap();

        let snap = store.load().unwrap();
        assert_eq!(snap.funds.len(), 1);
        assert_eq!(snap.funds[0].vintage_year, Some(2014));
    }

    #[test]
    fn alias_uniqueness_per_source() {
        let store = InMemoryRegistryStore::new();
        let a = fund("Acme Growth");
        let b = fund("Acme Value");
        store.upsert_fund(&a).unwrap();
        store.upsert_fund(&b).unwrap();

        store.insert_alias(&Alias::new(a.id, "Acme Growth", "wsib")).unwrap();
        // Same key, same fund: idempotent.
        store.insert_alias(&Alias::new(a.id, "ACME  growth", "wsib")).unwrap();
        assert_eq!(store.alias_count().unwrap(), 1);

        let err = store.insert_alias(&Alias::new(b.id, "acme growth", "wsib")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));

        // Same raw name from another source is a separate alias.
        store.insert_alias(&Alias::new(b.id, "Acme Growth", "calpers")).unwrap();
        assert_eq!(store.alias_count().unwrap(), 2);
    }

    #[test]
    fn alias_requires_known_fund() {
        let store = InMemoryRegistryStore::new();
        let err = store.insert_alias(&Alias::new(FundId::new(), "X", "wsib")).unwrap_err();
        assert!(matches!(err, StorageError::FundNotFound(_)));
    }

    #[test]
    fn repoint_moves_alias() {
        let store = InMemoryRegistryStore::new();
        let a = fund("Acme Growth");
        let b = fund("Acme Value");
        store.upsert_fund(&a).unwrap();
        store.upsert_fund(&b).unwrap();
        store.insert_alias(&Alias::new(a.id, "Acme", "wsib")).unwrap();

        store.repoint_alias(&Alias::new(b.id, "Acme", "wsib")).unwrap();
        let snap = store.load().unwrap();
        assert_eq!(snap.aliases.len(), 1);
        assert_eq!(snap.aliases[0].fund_id, b.id);
    }

    #[test]
    fn gp_alias_conflicts_rejected() {
        let store = InMemoryRegistryStore::new();
        let kkr = GpAlias {
            alias: "kkr".to_string(),
            canonical: "Kohlberg Kravis Roberts".to_string(),
        };
        store.insert_gp_alias(&kkr).unwrap();
        store.insert_gp_alias(&kkr).unwrap();

        let other = GpAlias {
            alias: "KKR".to_string(),
            canonical: "KKR Credit".to_string(),
        };
        let err = store.insert_gp_alias(&other).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[test]
    fn from_snapshot_round_trips() {
        let store = InMemoryRegistryStore::new();
        let a = fund("Acme Growth");
        store.upsert_fund(&a).unwrap();
        store.insert_alias(&Alias::new(a.id, "Acme Growth", "wsib")).unwrap();

        let snap = store.load().unwrap();
        let copy = InMemoryRegistryStore::from_snapshot(&snap).unwrap();
        assert_eq!(copy.load().unwrap(), snap);
        assert_eq!(copy.fund_count().unwrap(), 1);
    }
}
