//! Canonical fund identity and aliases.
//!
//! A [`CanonicalFund`] is the registry's unit of identity. It is created once,
//! never deleted, and afterwards only gains aliases or has unset descriptive
//! fields filled in.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, stable fund identifier.
///
/// # Examples
///
/// ```
/// use fundlink::FundId;
///
/// let id = FundId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundId(Uuid);

impl FundId {
    /// Creates a new random fund ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a fund ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil fund ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for FundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for FundId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::str::FromStr for FundId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Descriptive fields that may be filled after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillField {
    /// First-close year.
    VintageYear,
    /// General partner (raw spelling and key).
    GeneralPartner,
    /// Asset class.
    AssetClass,
    /// Sub-strategy.
    SubStrategy,
}

impl fmt::Display for BackfillField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VintageYear => write!(f, "vintage_year"),
            Self::GeneralPartner => write!(f, "general_partner"),
            Self::AssetClass => write!(f, "asset_class"),
            Self::SubStrategy => write!(f, "sub_strategy"),
        }
    }
}

/// Values a later source may contribute to an existing fund.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundPatch {
    /// Vintage year.
    pub vintage_year: Option<i32>,
    /// General partner as reported.
    pub general_partner_raw: Option<String>,
    /// Normalized GP key.
    pub general_partner_key: Option<String>,
    /// Asset class.
    pub asset_class: Option<String>,
    /// Sub-strategy.
    pub sub_strategy: Option<String>,
}

/// The single authoritative entity representing one real fund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFund {
    /// Fund ID.
    pub id: FundId,

    /// Human-readable name, fixed at creation.
    pub display_name: String,

    /// Raw spelling the fund was seeded from.
    pub raw_name: String,

    /// Comparable tokens, sequence marker removed.
    pub name_tokens: Vec<String>,

    /// Fund-family ordinal ("III" is 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,

    /// General partner as reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general_partner_raw: Option<String>,

    /// Canonical or normalized GP used for matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general_partner_key: Option<String>,

    /// Vintage year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vintage_year: Option<i32>,

    /// Asset class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,

    /// Sub-strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_strategy: Option<String>,

    /// Source that first reported this fund.
    pub seeded_by: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl CanonicalFund {
    /// Fills every unset descriptive field the patch provides.
    ///
    /// Fields that already hold a value are left untouched, so applying the
    /// same patch twice is a no-op the second time. Returns the fields that
    /// changed.
    pub fn fill_gaps(&mut self, patch: &FundPatch) -> Vec<BackfillField> {
        let mut filled = Vec::new();

        if self.vintage_year.is_none() {
            if let Some(year) = patch.vintage_year {
                self.vintage_year = Some(year);
                filled.push(BackfillField::VintageYear);
            }
        }

        if self.general_partner_key.is_none() {
            if let Some(key) = patch.general_partner_key.as_ref() {
                self.general_partner_key = Some(key.clone());
                self.general_partner_raw = patch.general_partner_raw.clone();
                filled.push(BackfillField::GeneralPartner);
            }
        }

        if self.asset_class.is_none() {
            if let Some(class) = patch.asset_class.as_ref() {
                self.asset_class = Some(class.clone());
                filled.push(BackfillField::AssetClass);
            }
        }

        if self.sub_strategy.is_none() {
            if let Some(strategy) = patch.sub_strategy.as_ref() {
                self.sub_strategy = Some(strategy.clone());
                filled.push(BackfillField::SubStrategy);
            }
        }

        filled
    }
}

/// Case- and whitespace-insensitive identity of an alias within one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AliasKey {
    /// Lowercased, whitespace-collapsed raw name.
    pub name: String,
    /// Source system ID.
    pub source_id: String,
}

impl AliasKey {
    /// Builds the key for a raw name seen in `source_id`.
    #[must_use]
    pub fn new(raw_name: &str, source_id: &str) -> Self {
        let name = raw_name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self {
            name,
            source_id: source_id.trim().to_string(),
        }
    }
}

impl fmt::Display for AliasKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.source_id)
    }
}

/// A raw spelling of a fund as seen from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Fund this alias resolves to.
    pub fund_id: FundId,
    /// Raw spelling as the source delivered it.
    pub raw_name: String,
    /// Source system ID.
    pub source_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Alias {
    /// Creates an alias stamped with the current time.
    #[must_use]
    pub fn new(fund_id: FundId, raw_name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            fund_id,
            raw_name: raw_name.into(),
            source_id: source_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Returns the uniqueness key of this alias.
    #[must_use]
    pub fn key(&self) -> AliasKey {
        AliasKey::new(&self.raw_name, &self.source_id)
    }
}

/// Alternate general-partner spelling mapped to a canonical GP name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpAlias {
    /// Alternate spelling.
    pub alias: String,
    /// Canonical GP name.
    pub canonical: String,
}
