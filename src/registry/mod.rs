//! The fund registry.
//!
//! Owns canonical funds, their per-source aliases and the GP alias table, and
//! is the single writer that attaches incoming records to funds. One instance
//! lives for a whole run:
//!
//! 1. [`FundRegistry::open`] loads the persisted state from a [`RegistryStore`].
//! 2. [`FundRegistry::resolve`] is called once per record, from any thread.
//! 3. [`FundRegistry::flush`] pushes new and changed rows back to the store.

mod index;
mod resolve;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::DecisionLog;
use crate::config::{EngineConfig, MatchPolicy};
use crate::error::{ConfigError, FundLinkError, FundLinkResult, StorageError};
use crate::fund::{Alias, AliasKey, CanonicalFund, FundId, GpAlias};
use crate::normalize::GpAliasTable;
use crate::scoring::Scorer;
use crate::storage::{RegistrySnapshot, RegistryStore};

use index::CandidateIndex;

fn lock_err(context: &'static str) -> FundLinkError {
    FundLinkError::internal(format!("poisoned lock: {context}"))
}

/// Pending store write for an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasWrite {
    Insert,
    Repoint,
}

#[derive(Debug, Default)]
struct RegistryState {
    funds: Vec<CanonicalFund>,
    by_id: HashMap<FundId, usize>,
    aliases: HashMap<AliasKey, Alias>,
    aliases_by_fund: HashMap<FundId, Vec<AliasKey>>,
    index: CandidateIndex,
    gp_aliases: GpAliasTable,
    reported_conflicts: HashSet<(AliasKey, FundId)>,
    dirty_funds: BTreeSet<usize>,
    dirty_aliases: BTreeMap<AliasKey, AliasWrite>,
    dirty_gp_aliases: Vec<GpAlias>,
}

impl RegistryState {
    fn push_fund(&mut self, fund: CanonicalFund) -> usize {
        let ordinal = self.funds.len();
        self.by_id.insert(fund.id, ordinal);
        self.index.insert_fund(ordinal, &fund);
        self.funds.push(fund);
        ordinal
    }

    fn load_alias(&mut self, alias: Alias) {
        let key = alias.key();
        self.aliases_by_fund
            .entry(alias.fund_id)
            .or_default()
            .push(key.clone());
        self.aliases.insert(key, alias);
    }

    fn attach_alias(&mut self, alias: Alias) {
        let key = alias.key();
        self.load_alias(alias);
        self.dirty_aliases.insert(key, AliasWrite::Insert);
    }

    fn repoint_alias(&mut self, alias: Alias) {
        let key = alias.key();
        if let Some(previous) = self.aliases.get(&key).map(|a| a.fund_id) {
            if let Some(keys) = self.aliases_by_fund.get_mut(&previous) {
                keys.retain(|k| k != &key);
            }
        }
        self.aliases_by_fund
            .entry(alias.fund_id)
            .or_default()
            .push(key.clone());
        self.aliases.insert(key.clone(), alias);
        self.dirty_aliases.entry(key).or_insert(AliasWrite::Repoint);
    }
}

/// Counts describing the registry's current contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Canonical funds.
    pub funds: usize,
    /// Aliases across all sources.
    pub aliases: usize,
    /// GP alias entries, seeds included.
    pub gp_aliases: usize,
    /// Funds created or changed since the last flush.
    pub pending_funds: usize,
    /// Aliases created or repointed since the last flush.
    pub pending_aliases: usize,
}

/// What a [`FundRegistry::flush`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Funds upserted.
    pub funds_written: usize,
    /// Aliases inserted or repointed.
    pub aliases_written: usize,
    /// GP aliases inserted.
    pub gp_aliases_written: usize,
    /// Uniqueness rejections reported by the store.
    pub rejected: Vec<String>,
}

impl FlushReport {
    /// True if the store accepted every write.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Registry of canonical funds.
pub struct FundRegistry {
    state: RwLock<RegistryState>,
    scorer: Scorer,
    overrides: HashMap<AliasKey, FundId>,
    log: Arc<dyn DecisionLog>,
    audit_incomplete: AtomicBool,
}

impl fmt::Debug for FundRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FundRegistry")
            .field("scorer", &self.scorer)
            .field("overrides", &self.overrides.len())
            .field("audit_incomplete", &self.audit_incomplete())
            .finish_non_exhaustive()
    }
}

impl FundRegistry {
    /// Creates an empty registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn new(config: &EngineConfig, log: Arc<dyn DecisionLog>) -> Result<Self, ConfigError> {
        config.policy.validate()?;
        let gp_aliases = config.gp_table()?;
        let overrides = config.override_map()?;

        Ok(Self {
            state: RwLock::new(RegistryState {
                gp_aliases,
                ..RegistryState::default()
            }),
            scorer: Scorer::new(config.policy.clone()),
            overrides,
            log,
            audit_incomplete: AtomicBool::new(false),
        })
    }

    /// Rebuilds a registry from persisted state.
    ///
    /// Funds keep their snapshot order, which is their creation order.
    /// Nothing loaded here is considered pending for the next flush.
    ///
    /// # Errors
    ///
    /// - `Config`: invalid configuration, or a persisted GP alias that
    ///   contradicts the configured seed
    /// - `Storage`: duplicate fund ids or aliases, or aliases of unknown funds
    pub fn from_snapshot(
        snapshot: RegistrySnapshot,
        config: &EngineConfig,
        log: Arc<dyn DecisionLog>,
    ) -> FundLinkResult<Self> {
        let registry = Self::new(config, log)?;
        {
            let mut guard = registry
                .state
                .write()
                .map_err(|_| lock_err("registry.from_snapshot"))?;
            let state = &mut *guard;

            for gp in &snapshot.gp_aliases {
                state.gp_aliases.insert(&gp.canonical, &gp.alias)?;
            }
            for fund in snapshot.funds {
                if state.by_id.contains_key(&fund.id) {
                    return Err(StorageError::DuplicateKey(format!("fund {}", fund.id)).into());
                }
                state.push_fund(fund);
            }
            for alias in snapshot.aliases {
                if !state.by_id.contains_key(&alias.fund_id) {
                    return Err(StorageError::FundNotFound(alias.fund_id).into());
                }
                let key = alias.key();
                if state.aliases.contains_key(&key) {
                    return Err(StorageError::DuplicateKey(format!("alias {key}")).into());
                }
                state.load_alias(alias);
            }

            info!(
                funds = state.funds.len(),
                aliases = state.aliases.len(),
                gp_aliases = state.gp_aliases.len(),
                "registry loaded"
            );
        }
        Ok(registry)
    }

    /// Loads a registry from a store at the start of a run.
    ///
    /// # Errors
    ///
    /// Propagates store load failures and the errors of
    /// [`FundRegistry::from_snapshot`].
    pub fn open(
        store: &dyn RegistryStore,
        config: &EngineConfig,
        log: Arc<dyn DecisionLog>,
    ) -> FundLinkResult<Self> {
        let snapshot = store.load()?;
        Self::from_snapshot(snapshot, config, log)
    }

    /// Writes every fund, alias and GP alias created or changed since the
    /// last flush, then syncs the store.
    ///
    /// Uniqueness rejections are reported in the returned [`FlushReport`]
    /// rather than failing the flush.
    ///
    /// # Errors
    ///
    /// Returns the first non-uniqueness store error. Pending writes are kept
    /// so the flush can be retried.
    pub fn flush(&self, store: &dyn RegistryStore) -> Result<FlushReport, StorageError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StorageError::BackendError("poisoned lock: registry.flush".to_string()))?;
        let state = &mut *guard;
        let mut report = FlushReport::default();

        for &ordinal in &state.dirty_funds {
            if let Some(fund) = state.funds.get(ordinal) {
                store.upsert_fund(fund)?;
                report.funds_written += 1;
            }
        }

        for (key, write) in &state.dirty_aliases {
            let Some(alias) = state.aliases.get(key) else {
                continue;
            };
            let written = match write {
                AliasWrite::Insert => store.insert_alias(alias),
                AliasWrite::Repoint => store.repoint_alias(alias),
            };
            match written {
                Ok(()) => report.aliases_written += 1,
                Err(StorageError::DuplicateKey(detail)) => {
                    warn!(alias = %key, detail = %detail, "store rejected alias");
                    report.rejected.push(detail);
                }
                Err(e) => return Err(e),
            }
        }

        for gp in &state.dirty_gp_aliases {
            match store.insert_gp_alias(gp) {
                Ok(()) => report.gp_aliases_written += 1,
                Err(StorageError::DuplicateKey(detail)) => {
                    warn!(alias = %gp.alias, detail = %detail, "store rejected GP alias");
                    report.rejected.push(detail);
                }
                Err(e) => return Err(e),
            }
        }

        store.sync()?;

        state.dirty_funds.clear();
        state.dirty_aliases.clear();
        state.dirty_gp_aliases.clear();

        info!(
            funds = report.funds_written,
            aliases = report.aliases_written,
            gp_aliases = report.gp_aliases_written,
            rejected = report.rejected.len(),
            "registry flushed"
        );
        Ok(report)
    }

    /// Returns a fund by ID.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn get(&self, id: FundId) -> FundLinkResult<Option<CanonicalFund>> {
        let state = self.state.read().map_err(|_| lock_err("registry.get"))?;
        Ok(state.by_id.get(&id).map(|&i| state.funds[i].clone()))
    }

    /// All aliases of a fund, in attachment order.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn aliases_for(&self, id: FundId) -> FundLinkResult<Vec<Alias>> {
        let state = self.state.read().map_err(|_| lock_err("registry.aliases_for"))?;
        Ok(state
            .aliases_by_fund
            .get(&id)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| state.aliases.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// The fund a raw name from `source_id` is aliased to, if any.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn lookup_alias(&self, raw_name: &str, source_id: &str) -> FundLinkResult<Option<FundId>> {
        let state = self.state.read().map_err(|_| lock_err("registry.lookup_alias"))?;
        Ok(state
            .aliases
            .get(&AliasKey::new(raw_name, source_id))
            .map(|a| a.fund_id))
    }

    /// Current counts.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn stats(&self) -> FundLinkResult<RegistryStats> {
        let state = self.state.read().map_err(|_| lock_err("registry.stats"))?;
        Ok(RegistryStats {
            funds: state.funds.len(),
            aliases: state.aliases.len(),
            gp_aliases: state.gp_aliases.len(),
            pending_funds: state.dirty_funds.len(),
            pending_aliases: state.dirty_aliases.len(),
        })
    }

    /// Full copy of the registry, funds in creation order and aliases grouped
    /// by fund.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn snapshot(&self) -> FundLinkResult<RegistrySnapshot> {
        let state = self.state.read().map_err(|_| lock_err("registry.snapshot"))?;
        let aliases = state
            .funds
            .iter()
            .filter_map(|f| state.aliases_by_fund.get(&f.id))
            .flatten()
            .filter_map(|k| state.aliases.get(k).cloned())
            .collect();
        Ok(RegistrySnapshot {
            funds: state.funds.clone(),
            aliases,
            gp_aliases: state.gp_aliases.entries(),
        })
    }

    /// Which alias keys share a fund, independent of fund ids and of the order
    /// funds were created in.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn topology(&self) -> FundLinkResult<Vec<Vec<AliasKey>>> {
        let state = self.state.read().map_err(|_| lock_err("registry.topology"))?;
        let mut groups: Vec<Vec<AliasKey>> = state
            .funds
            .iter()
            .map(|f| {
                let mut keys = state.aliases_by_fund.get(&f.id).cloned().unwrap_or_default();
                keys.sort();
                keys
            })
            .collect();
        groups.sort();
        Ok(groups)
    }

    /// BLAKE3 digest of [`FundRegistry::topology`], hex encoded.
    ///
    /// Two registries that grouped the same aliases the same way have equal
    /// fingerprints.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned.
    pub fn topology_fingerprint(&self) -> FundLinkResult<String> {
        let mut hasher = blake3::Hasher::new();
        for group in self.topology()? {
            for key in group {
                hasher.update(key.name.as_bytes());
                hasher.update(&[0x1f]);
                hasher.update(key.source_id.as_bytes());
                hasher.update(&[0x1e]);
            }
            hasher.update(&[0x1d]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// True once any decision failed to reach the decision log.
    #[must_use]
    pub fn audit_incomplete(&self) -> bool {
        self.audit_incomplete.load(Ordering::SeqCst)
    }

    /// The decision log this registry writes to.
    #[must_use]
    pub fn decision_log(&self) -> &dyn DecisionLog {
        self.log.as_ref()
    }

    /// The active match policy.
    #[must_use]
    pub const fn policy(&self) -> &MatchPolicy {
        self.scorer.policy()
    }
}
