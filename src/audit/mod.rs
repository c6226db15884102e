//! Append-only audit trail of resolution decisions.
//!
//! Every link, creation, override and conflict is written once as a
//! [`MatchDecision`] and never mutated. Backends implement [`DecisionLog`].

mod jsonl;
mod memory;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuditError;
use crate::fund::{BackfillField, FundId};
use crate::scoring::Signals;

pub use jsonl::JsonlDecisionLog;
pub use memory::InMemoryDecisionLog;

/// Unique identifier of one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(Uuid);

impl DecisionId {
    /// Creates a new random decision ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the registry did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Identical name, corroborated by GP or vintage.
    Exact,
    /// Replay of a known alias that changed something (e.g. a backfill).
    Alias,
    /// Similar name with enough agreeing signals.
    FuzzyAuto,
    /// Similar name, linked but awaiting review.
    FuzzyFlagged,
    /// No candidate matched; a fund was created.
    New,
    /// Curated override, forced link or repoint.
    ManualOverride,
    /// A known alias disagreed with the freshly computed target.
    AliasConflict,
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::FuzzyAuto => "fuzzy_auto",
            Self::FuzzyFlagged => "fuzzy_flagged",
            Self::New => "new",
            Self::ManualOverride => "manual_override",
            Self::AliasConflict => "alias_conflict",
        };
        f.write_str(s)
    }
}

/// One write-once audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    /// Unique decision ID.
    pub id: DecisionId,
    /// Raw fund name as delivered.
    pub raw_name: String,
    /// Source system that delivered the record.
    pub source_id: String,

    /// Best candidate considered, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<FundId>,

    /// Signals computed against the candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<Signals>,

    /// What the registry did.
    pub outcome: DecisionOutcome,

    /// Fund the record ended up attached to.
    pub fund_id: FundId,

    /// True when a reviewer should confirm the link.
    pub needs_review: bool,

    /// The name consisted only of generic industry words.
    #[serde(default)]
    pub low_distinctiveness: bool,

    /// Fund fields filled from this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backfilled: Vec<BackfillField>,

    /// Free-text context (override reason, veto details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}

impl MatchDecision {
    /// Creates a decision with no candidate, signals or flags.
    #[must_use]
    pub fn new(
        raw_name: impl Into<String>,
        source_id: impl Into<String>,
        outcome: DecisionOutcome,
        fund_id: FundId,
    ) -> Self {
        Self {
            id: DecisionId::new(),
            raw_name: raw_name.into(),
            source_id: source_id.into(),
            candidate_id: None,
            signals: None,
            outcome,
            fund_id,
            needs_review: false,
            low_distinctiveness: false,
            backfilled: Vec::new(),
            note: None,
            decided_at: Utc::now(),
        }
    }

    /// Records the candidate that was scored.
    #[must_use]
    pub fn with_candidate(mut self, candidate_id: FundId, signals: Signals) -> Self {
        self.candidate_id = Some(candidate_id);
        self.signals = Some(signals);
        self
    }

    /// Marks the decision for human review.
    #[must_use]
    pub fn flagged(mut self) -> Self {
        self.needs_review = true;
        self
    }

    /// Sets the low-distinctiveness flag.
    #[must_use]
    pub fn with_low_distinctiveness(mut self, low: bool) -> Self {
        self.low_distinctiveness = low;
        self
    }

    /// Lists fields filled from this record.
    #[must_use]
    pub fn with_backfilled(mut self, fields: Vec<BackfillField>) -> Self {
        self.backfilled = fields;
        self
    }

    /// Attaches a free-text note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// True if this decision belongs in the human review queue.
    #[must_use]
    pub fn is_review_item(&self) -> bool {
        self.needs_review || (self.outcome == DecisionOutcome::New && self.low_distinctiveness)
    }

    /// True if this decision concerns `fund_id`, as result or as candidate.
    #[must_use]
    pub fn concerns(&self, fund_id: FundId) -> bool {
        self.fund_id == fund_id || self.candidate_id == Some(fund_id)
    }
}

/// Append-only store of [`MatchDecision`]s.
pub trait DecisionLog: Send + Sync {
    /// Appends a decision. Prior entries are never touched.
    fn record(&self, decision: MatchDecision) -> Result<(), AuditError>;

    /// All decisions concerning a fund, oldest first.
    fn for_fund(&self, fund_id: FundId) -> Result<Vec<MatchDecision>, AuditError>;

    /// Flagged links, alias conflicts and low-distinctiveness creations.
    fn review_queue(&self) -> Result<Vec<MatchDecision>, AuditError>;

    /// Number of recorded decisions.
    fn len(&self) -> Result<usize, AuditError>;

    /// Returns true if nothing has been recorded.
    fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }
}
