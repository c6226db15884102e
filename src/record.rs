//! Records crossing the engine boundary.
//!
//! Adapters build a [`RawFundRecord`] from whatever document they parse; the
//! registry answers with a [`ResolutionResult`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::fund::FundId;

/// One fund mention as reported by a single source.
///
/// # Examples
///
/// ```
/// use fundlink::RawFundRecord;
///
/// let record = RawFundRecord::new("KKR 2006 Fund, L.P.", "calpers")
///     .with_general_partner("Kohlberg Kravis Roberts")
///     .with_vintage_year(2006);
/// assert_eq!(record.vintage_year, Some(2006));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFundRecord {
    /// Fund name exactly as the source reported it.
    pub raw_fund_name: String,

    /// General partner as the source reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_partner_raw: Option<String>,

    /// Vintage year, if the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vintage_year: Option<i32>,

    /// Adapter-supplied sequence number, used when the name carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_hint: Option<u32>,

    /// Identifier of the delivering source system.
    pub source_system_id: String,
}

impl RawFundRecord {
    /// Creates a record with only the required fields.
    #[must_use]
    pub fn new(raw_fund_name: impl Into<String>, source_system_id: impl Into<String>) -> Self {
        Self {
            raw_fund_name: raw_fund_name.into(),
            general_partner_raw: None,
            vintage_year: None,
            sequence_hint: None,
            source_system_id: source_system_id.into(),
        }
    }

    /// Sets the general partner name.
    #[must_use]
    pub fn with_general_partner(mut self, gp: impl Into<String>) -> Self {
        self.general_partner_raw = Some(gp.into());
        self
    }

    /// Sets the vintage year.
    #[must_use]
    pub fn with_vintage_year(mut self, year: i32) -> Self {
        self.vintage_year = Some(year);
        self
    }

    /// Sets the sequence hint.
    #[must_use]
    pub fn with_sequence_hint(mut self, sequence: u32) -> Self {
        self.sequence_hint = Some(sequence);
        self
    }
}

/// How a record was attached to its canonical fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Identical normalized name, corroborated.
    Exact,
    /// Known (raw name, source) pair.
    Alias,
    /// Similar name with enough agreeing secondary signals.
    FuzzyAuto,
    /// Similar name, linked but awaiting human review.
    FuzzyFlagged,
    /// No acceptable candidate; a new fund was created.
    New,
    /// Curated override or caller-forced link.
    ManualOverride,
}

impl MatchType {
    /// Returns the wire name of this match type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::FuzzyAuto => "fuzzy_auto",
            Self::FuzzyFlagged => "fuzzy_flagged",
            Self::New => "new",
            Self::ManualOverride => "manual_override",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one [`RawFundRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Canonical fund the record resolved to.
    pub fund_id: FundId,
    /// How the record was matched.
    pub match_type: MatchType,
    /// True if this record created the fund.
    pub created_new: bool,
    /// Confidence in the link, in [0, 1].
    pub confidence: f64,

    /// True when a reviewer should confirm this link.
    pub needs_review: bool,

    /// Non-fatal problems met while resolving this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ResolutionError>,

    /// False when the decision could not be written to the audit log.
    pub audit_recorded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_with_missing_optionals() {
        let json = r#"{"raw_fund_name":"Fund A","source_system_id":"wsib"}"#;
        let record: RawFundRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, RawFundRecord::new("Fund A", "wsib"));
    }

    #[test]
    fn match_type_wire_names() {
        assert_eq!(MatchType::FuzzyFlagged.to_string(), "fuzzy_flagged");
        assert_eq!(
            serde_json::to_string(&MatchType::ManualOverride).unwrap(),
            "\"manual_override\""
        );
    }
}
