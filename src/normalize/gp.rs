//! General-partner alias table.
//!
//! Curated spellings always win over computed similarity: a GP string found
//! here resolves straight to its canonical name.

use std::collections::{BTreeMap, HashMap};

use crate::error::ConfigError;
use crate::fund::GpAlias;

use super::normalize_gp_name;

fn fold(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Flat lookup from alternate GP spelling to canonical GP name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpAliasTable {
    by_alias: HashMap<String, String>,
}

impl GpAliasTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from a seed of canonical name to alternate spellings.
    ///
    /// Each canonical name is registered as an alias of itself.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingGpAlias`] if one spelling is listed
    /// under two different canonical names.
    pub fn from_seed(seed: &BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        for (canonical, alternates) in seed {
            table.insert(canonical, canonical)?;
            for alias in alternates {
                table.insert(canonical, alias)?;
            }
        }
        Ok(table)
    }

    /// Registers `alias` as a spelling of `canonical`.
    ///
    /// Returns `Ok(true)` if the mapping is new and `Ok(false)` if it was
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingGpAlias`] if `alias` already maps to a
    /// different canonical name.
    pub fn insert(&mut self, canonical: &str, alias: &str) -> Result<bool, ConfigError> {
        let canonical = canonical.trim();
        let key = fold(alias);
        if key.is_empty() || canonical.is_empty() {
            return Err(ConfigError::invalid("GP alias and canonical name must be non-empty"));
        }

        if let Some(existing) = self.by_alias.get(&key) {
            if fold(existing) == fold(canonical) {
                return Ok(false);
            }
            return Err(ConfigError::ConflictingGpAlias {
                alias: alias.trim().to_string(),
                existing: existing.clone(),
                requested: canonical.to_string(),
            });
        }

        self.by_alias.insert(key, canonical.to_string());
        Ok(true)
    }

    /// Returns the canonical GP name for a raw spelling, if curated.
    #[must_use]
    pub fn canonical_for(&self, raw: &str) -> Option<&str> {
        self.by_alias.get(&fold(raw)).map(String::as_str)
    }

    /// Returns the matching key for a raw GP string.
    ///
    /// Curated spellings map to the canonical name, lowercased and
    /// whitespace-collapsed but otherwise kept as curated. Anything else goes
    /// through [`normalize_gp_name`].
    #[must_use]
    pub fn canonical_key(&self, raw: &str) -> Option<String> {
        match self.canonical_for(raw) {
            Some(canonical) => Some(fold(canonical)),
            None => normalize_gp_name(raw),
        }
    }

    /// All entries, sorted by alias.
    #[must_use]
    pub fn entries(&self) -> Vec<GpAlias> {
        let mut out: Vec<GpAlias> = self
            .by_alias
            .iter()
            .map(|(alias, canonical)| GpAlias {
                alias: alias.clone(),
                canonical: canonical.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.alias.cmp(&b.alias));
        out
    }

    /// Number of alias entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}
