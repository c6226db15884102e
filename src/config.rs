//! Engine configuration.
//!
//! Everything the registry consumes at initialization: match thresholds, the
//! GP alias seed table, and curated (raw name, source) → fund overrides.
//!
//! ```toml
//! [policy]
//! name_threshold = 0.85
//! min_secondary_signals = 2
//! structure_veto = true
//!
//! [gp_aliases]
//! "Kohlberg Kravis Roberts" = ["KKR", "KKR & Co."]
//!
//! [[overrides]]
//! raw_name = "BCP VII"
//! source_id = "calpers"
//! fund_id = "4f1c2a8e-3d7b-4c1e-9a55-0b6f7e2d9c10"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fund::{AliasKey, FundId};
use crate::normalize::GpAliasTable;
use crate::similarity::SimilarityKind;

/// Thresholds for the match decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Minimum token-sort similarity for any fuzzy link.
    pub name_threshold: f64,
    /// Minimum ratio for two different GP keys to count as the same GP.
    pub gp_threshold: f64,
    /// Agreeing secondary signals needed for an unflagged fuzzy link.
    pub min_secondary_signals: usize,
    /// Reject candidates whose strategy/geography keywords differ.
    pub strategy_veto: bool,
    /// Reject fuzzy candidates whose names, compared in word order, score
    /// below `min_plain_ratio`. Catches generic words reshuffled around a
    /// different brand.
    pub structure_veto: bool,
    /// Floor for the word-order similarity checked by `structure_veto`.
    pub min_plain_ratio: f64,
    /// Reject fuzzy candidates whose distinctive tokens overlap (Jaccard)
    /// less than `min_distinctive_overlap`.
    pub distinctive_overlap_veto: bool,
    /// Floor for the overlap checked by `distinctive_overlap_veto`.
    pub min_distinctive_overlap: f64,
    /// Derive a new fund's GP from its name when the record carries none.
    pub infer_gp_from_name: bool,
    /// String similarity backend.
    pub similarity: SimilarityKind,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            name_threshold: 0.85,
            gp_threshold: 0.85,
            min_secondary_signals: 2,
            strategy_veto: false,
            structure_veto: false,
            min_plain_ratio: 0.65,
            distinctive_overlap_veto: false,
            min_distinctive_overlap: 0.3,
            infer_gp_from_name: true,
            similarity: SimilarityKind::Indel,
        }
    }
}

impl MatchPolicy {
    /// Checks threshold ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("name_threshold", self.name_threshold),
            ("gp_threshold", self.gp_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("min_plain_ratio", self.min_plain_ratio),
            ("min_distinctive_overlap", self.min_distinctive_overlap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if !(1..=3).contains(&self.min_secondary_signals) {
            return Err(ConfigError::invalid(format!(
                "min_secondary_signals must be between 1 and 3, got {}",
                self.min_secondary_signals
            )));
        }
        Ok(())
    }
}

/// A curated (raw name, source) → fund mapping that beats any computed decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    /// Raw fund name as the source spells it.
    pub raw_name: String,
    /// Source system the override applies to.
    pub source_id: String,
    /// Fund the record must resolve to.
    pub fund_id: FundId,
}

impl OverrideEntry {
    /// The alias key this override applies to.
    #[must_use]
    pub fn key(&self) -> AliasKey {
        AliasKey::new(&self.raw_name, &self.source_id)
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Match thresholds.
    pub policy: MatchPolicy,
    /// Canonical GP name → alternate spellings.
    pub gp_aliases: BTreeMap<String, Vec<String>>,
    /// Curated overrides, checked before any scoring.
    pub overrides: Vec<OverrideEntry>,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] / [`ConfigError::ConflictingGpAlias`] for
    /// inconsistent content.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validates policy, GP seed and override list.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_toml_str`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.gp_table()?;
        self.override_map()?;
        Ok(())
    }

    /// Builds the GP alias table from the seed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingGpAlias`] if the seed maps one
    /// spelling to two canonical names.
    pub fn gp_table(&self) -> Result<GpAliasTable, ConfigError> {
        GpAliasTable::from_seed(&self.gp_aliases)
    }

    /// Indexes overrides by alias key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if two overrides share a key but name
    /// different funds.
    pub fn override_map(&self) -> Result<HashMap<AliasKey, FundId>, ConfigError> {
        let mut map = HashMap::with_capacity(self.overrides.len());
        for entry in &self.overrides {
            let key = entry.key();
            if key.name.is_empty() || key.source_id.is_empty() {
                return Err(ConfigError::invalid("override raw_name and source_id must be non-empty"));
            }
            if let Some(previous) = map.insert(key.clone(), entry.fund_id) {
                if previous != entry.fund_id {
                    return Err(ConfigError::invalid(format!(
                        "override for '{key}' names both {previous} and {}",
                        entry.fund_id
                    )));
                }
            }
        }
        Ok(map)
    }
}
