//! Pairwise signals and the match decision table.
//!
//! The scorer compares one normalized incoming record with one canonical
//! fund. It never fails: absent data yields `Unknown` or `false` signals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MatchPolicy;
use crate::fund::CanonicalFund;
use crate::normalize::{distinctive_overlap, sorted_key, strategy_keywords, NormalizedRecord};
use crate::similarity::StringSimilarity;

/// Whether two sequence numbers agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceAgreement {
    /// Both sides carry the same number.
    Agree,
    /// Both sides carry a number and they differ.
    Disagree,
    /// At least one side has no sequence number.
    Unknown,
}

impl SequenceAgreement {
    /// Compares two optional sequence numbers.
    #[must_use]
    pub fn between(a: Option<u32>, b: Option<u32>) -> Self {
        match (a, b) {
            (Some(x), Some(y)) if x == y => Self::Agree,
            (Some(_), Some(_)) => Self::Disagree,
            _ => Self::Unknown,
        }
    }
}

/// Agreement signals between an incoming record and a candidate fund.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Token-sort similarity of the names, in [0, 1].
    pub name_similarity: f64,
    /// Both GP keys present and equal or near-equal.
    pub gp_match: bool,
    /// Both vintages present and equal.
    pub vintage_match: bool,
    /// Sequence number agreement.
    pub sequence: SequenceAgreement,
}

impl Signals {
    /// Number of agreeing secondary signals (GP, vintage, sequence).
    #[must_use]
    pub fn agreeing_secondary(&self) -> usize {
        usize::from(self.gp_match)
            + usize::from(self.vintage_match)
            + usize::from(self.sequence == SequenceAgreement::Agree)
    }
}

/// Result of the decision table, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// No link.
    None,
    /// Link that needs review.
    FuzzyFlagged,
    /// Confident fuzzy link.
    FuzzyAuto,
    /// Known alias of the candidate.
    Alias,
    /// Identical, corroborated name.
    Exact,
}

impl MatchOutcome {
    /// True for outcomes that attach the record to the candidate.
    #[must_use]
    pub const fn is_link(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// True for links that need no human review.
    #[must_use]
    pub const fn is_confident_link(&self) -> bool {
        matches!(self, Self::Exact | Self::Alias | Self::FuzzyAuto)
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::FuzzyFlagged => write!(f, "fuzzy_flagged"),
            Self::FuzzyAuto => write!(f, "fuzzy_auto"),
            Self::Alias => write!(f, "alias"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// Signals plus the outcome they produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Computed signals.
    pub signals: Signals,
    /// Decision table result.
    pub outcome: MatchOutcome,
}

/// Computes signals and applies the match policy.
pub struct Scorer {
    policy: MatchPolicy,
    similarity: Box<dyn StringSimilarity>,
}

impl fmt::Debug for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scorer").field("policy", &self.policy).finish_non_exhaustive()
    }
}

impl Scorer {
    /// Creates a scorer using the similarity backend named by the policy.
    #[must_use]
    pub fn new(policy: MatchPolicy) -> Self {
        let similarity = policy.similarity.build();
        Self { policy, similarity }
    }

    /// Creates a scorer with a caller-supplied similarity backend.
    #[must_use]
    pub fn with_similarity(policy: MatchPolicy, similarity: Box<dyn StringSimilarity>) -> Self {
        Self { policy, similarity }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Computes agreement signals.
    #[must_use]
    pub fn score(&self, candidate: &CanonicalFund, incoming: &NormalizedRecord) -> Signals {
        let name_similarity = self
            .similarity
            .token_sort_ratio(&candidate.name_tokens, &incoming.name.tokens)
            .clamp(0.0, 1.0);

        let gp_match = match (candidate.general_partner_key.as_deref(), incoming.gp_key.as_deref()) {
            (Some(a), Some(b)) => a == b || self.similarity.ratio(a, b) >= self.policy.gp_threshold,
            _ => false,
        };

        let vintage_match = matches!(
            (candidate.vintage_year, incoming.vintage_year),
            (Some(a), Some(b)) if a == b
        );

        Signals {
            name_similarity,
            gp_match,
            vintage_match,
            sequence: SequenceAgreement::between(
                candidate.sequence_number,
                incoming.name.sequence_number,
            ),
        }
    }

    /// Applies the decision table to precomputed signals.
    ///
    /// `alias_hit` is true when the incoming raw name is already an alias of
    /// the candidate in the same source.
    #[must_use]
    pub fn decide(
        &self,
        candidate: &CanonicalFund,
        incoming: &NormalizedRecord,
        signals: &Signals,
        alias_hit: bool,
    ) -> MatchOutcome {
        if signals.sequence == SequenceAgreement::Disagree {
            return MatchOutcome::None;
        }

        if self.policy.strategy_veto
            && strategy_keywords(&candidate.name_tokens) != strategy_keywords(&incoming.name.tokens)
        {
            return MatchOutcome::None;
        }

        let vintage_conflict = matches!(
            (candidate.vintage_year, incoming.vintage_year),
            (Some(a), Some(b)) if a != b
        );
        let same_tokens = !incoming.name.is_empty()
            && sorted_key(&candidate.name_tokens) == incoming.name.sorted_key();
        let same_sequence = candidate.sequence_number == incoming.name.sequence_number;
        let corroborated = (signals.gp_match || signals.vintage_match) && !vintage_conflict;
        if same_tokens && same_sequence && corroborated {
            return MatchOutcome::Exact;
        }

        if alias_hit {
            return MatchOutcome::Alias;
        }

        if self.policy.structure_veto {
            let plain = self
                .similarity
                .ratio(&candidate.name_tokens.join(" "), &incoming.name.tokens.join(" "));
            if plain < self.policy.min_plain_ratio {
                return MatchOutcome::None;
            }
        }

        if self.policy.distinctive_overlap_veto
            && distinctive_overlap(&candidate.name_tokens, &incoming.name.tokens)
                .is_some_and(|overlap| overlap < self.policy.min_distinctive_overlap)
        {
            return MatchOutcome::None;
        }

        if signals.name_similarity >= self.policy.name_threshold {
            if signals.agreeing_secondary() >= self.policy.min_secondary_signals {
                return MatchOutcome::FuzzyAuto;
            }
            return MatchOutcome::FuzzyFlagged;
        }

        MatchOutcome::None
    }

    /// Scores and decides in one step.
    #[must_use]
    pub fn evaluate(
        &self,
        candidate: &CanonicalFund,
        incoming: &NormalizedRecord,
        alias_hit: bool,
    ) -> Evaluation {
        let signals = self.score(candidate, incoming);
        let outcome = self.decide(candidate, incoming, &signals, alias_hit);
        Evaluation { signals, outcome }
    }

    /// Confidence attached to a link of the given outcome.
    #[must_use]
    pub fn confidence(outcome: MatchOutcome, signals: &Signals) -> f64 {
        match outcome {
            MatchOutcome::Exact | MatchOutcome::Alias => 1.0,
            MatchOutcome::FuzzyAuto | MatchOutcome::FuzzyFlagged => {
                #[allow(clippy::cast_precision_loss)]
                let weight = 0.70 + 0.10 * signals.agreeing_secondary() as f64;
                (signals.name_similarity * weight).min(1.0)
            }
            MatchOutcome::None => 0.0,
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}
