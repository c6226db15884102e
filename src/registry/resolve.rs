//! Resolution: attaching one raw record to a canonical fund.
//!
//! Everything that touches registry state runs under the write lock. The
//! decisions it produces are written to the log only after the lock is
//! released.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audit::{DecisionOutcome, MatchDecision};
use crate::classify::classify_strategy;
use crate::error::{FundLinkError, FundLinkResult, ResolutionError};
use crate::fund::{Alias, AliasKey, BackfillField, CanonicalFund, FundId, FundPatch, GpAlias};
use crate::normalize::{
    display_name, gp_from_fund_name, is_low_distinctiveness, normalize_record, NormalizedRecord,
};
use crate::record::{MatchType, RawFundRecord, ResolutionResult};
use crate::scoring::{Evaluation, MatchOutcome, Scorer, Signals};

use super::{lock_err, FundRegistry, RegistryState};

struct Resolved {
    result: ResolutionResult,
    decisions: Vec<MatchDecision>,
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    ordinal: usize,
    evaluation: Evaluation,
}

#[derive(Debug, Default)]
struct Scan {
    best: Option<Scored>,
    closest: Option<Scored>,
}

/// Stronger outcome first, then higher name similarity. Earlier funds win
/// exact ties because candidates are visited in creation order.
fn outranks(a: &Evaluation, b: &Evaluation) -> bool {
    a.outcome > b.outcome
        || (a.outcome == b.outcome && a.signals.name_similarity > b.signals.name_similarity)
}

fn link_types(outcome: MatchOutcome) -> Option<(MatchType, DecisionOutcome)> {
    match outcome {
        MatchOutcome::Exact => Some((MatchType::Exact, DecisionOutcome::Exact)),
        MatchOutcome::Alias => Some((MatchType::Alias, DecisionOutcome::Alias)),
        MatchOutcome::FuzzyAuto => Some((MatchType::FuzzyAuto, DecisionOutcome::FuzzyAuto)),
        MatchOutcome::FuzzyFlagged => {
            Some((MatchType::FuzzyFlagged, DecisionOutcome::FuzzyFlagged))
        }
        MatchOutcome::None => None,
    }
}

fn sequence_veto(fund: &CanonicalFund, incoming: &NormalizedRecord) -> Option<ResolutionError> {
    match (incoming.name.sequence_number, fund.sequence_number) {
        (Some(incoming_seq), Some(existing)) if incoming_seq != existing => {
            Some(ResolutionError::SequenceVetoViolation {
                raw_name: incoming.raw_name.clone(),
                target: fund.id,
                incoming: incoming_seq,
                existing,
            })
        }
        _ => None,
    }
}

fn patch_from(incoming: &NormalizedRecord) -> FundPatch {
    let class = classify_strategy(&incoming.raw_name);
    FundPatch {
        vintage_year: incoming.vintage_year,
        general_partner_raw: incoming.gp_raw.clone(),
        general_partner_key: incoming.gp_key.clone(),
        // The default class carries no information, so only keyword hits fill.
        asset_class: class.sub_strategy.map(|_| class.asset_class.to_string()),
        sub_strategy: class.sub_strategy.map(str::to_string),
    }
}

fn decision(incoming: &NormalizedRecord, outcome: DecisionOutcome, fund_id: FundId) -> MatchDecision {
    MatchDecision::new(&incoming.raw_name, &incoming.source_id, outcome, fund_id)
        .with_low_distinctiveness(is_low_distinctiveness(&incoming.name.tokens))
}

impl FundRegistry {
    /// Resolves one raw record to a canonical fund.
    ///
    /// Never creates a second fund for a (raw name, source) pair it has seen
    /// before. Per-record problems are returned in
    /// [`ResolutionResult::issues`]; a decision-log failure only clears
    /// [`ResolutionResult::audit_recorded`].
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the registry lock is poisoned or its indexes are
    /// inconsistent. The failure is scoped to this record.
    pub fn resolve(&self, record: &RawFundRecord) -> FundLinkResult<ResolutionResult> {
        let resolved = {
            let mut guard = self.state.write().map_err(|_| lock_err("registry.resolve"))?;
            self.resolve_locked(&mut guard, record)?
        };
        Ok(self.commit(resolved))
    }

    /// Links a record to `target` regardless of computed signals.
    ///
    /// The sequence veto still applies: a vetoed record is resolved as if no
    /// candidate matched, and the violation is attached as an issue.
    ///
    /// # Errors
    ///
    /// Returns `Resolution(UnknownFund)` if `target` is not in the registry.
    pub fn force_link(&self, record: &RawFundRecord, target: FundId) -> FundLinkResult<ResolutionResult> {
        let resolved = {
            let mut guard = self.state.write().map_err(|_| lock_err("registry.force_link"))?;
            let state = &mut *guard;
            let incoming = normalize_record(record, &state.gp_aliases);
            let key = AliasKey::new(&incoming.raw_name, &incoming.source_id);
            let ordinal = *state
                .by_id
                .get(&target)
                .ok_or(ResolutionError::UnknownFund { id: target })?;

            match sequence_veto(&state.funds[ordinal], &incoming) {
                None => self.link_manual(state, ordinal, &incoming, &key, "forced link", true),
                Some(violation) => {
                    warn!(
                        raw_name = %incoming.raw_name,
                        source = %incoming.source_id,
                        target = %target,
                        "forced link vetoed by sequence mismatch"
                    );
                    self.fallback(state, &incoming, &key, ordinal, violation)?
                }
            }
        };
        Ok(self.commit(resolved))
    }

    /// Points an existing (or new) alias at `target`.
    ///
    /// # Errors
    ///
    /// - `Resolution(UnknownFund)`: `target` is not in the registry
    /// - `Resolution(SequenceVetoViolation)`: the raw name carries a sequence
    ///   number different from the target's
    pub fn repoint_alias(
        &self,
        raw_name: &str,
        source_id: &str,
        target: FundId,
        note: &str,
    ) -> FundLinkResult<ResolutionResult> {
        let record = RawFundRecord::new(raw_name, source_id);
        let resolved = {
            let mut guard = self.state.write().map_err(|_| lock_err("registry.repoint_alias"))?;
            let state = &mut *guard;
            let incoming = normalize_record(&record, &state.gp_aliases);
            let key = AliasKey::new(&incoming.raw_name, &incoming.source_id);
            let ordinal = *state
                .by_id
                .get(&target)
                .ok_or(ResolutionError::UnknownFund { id: target })?;

            if let Some(violation) = sequence_veto(&state.funds[ordinal], &incoming) {
                warn!(alias = %key, target = %target, "repoint refused by sequence veto");
                return Err(violation.into());
            }
            self.link_manual(state, ordinal, &incoming, &key, note, true)
        };
        Ok(self.commit(resolved))
    }

    /// Registers an alternate GP spelling.
    ///
    /// Funds whose stored GP now resolves to a different key are re-keyed so
    /// later records find them through the new spelling. Returns `false` if
    /// the mapping already existed.
    ///
    /// # Errors
    ///
    /// Returns `Config(ConflictingGpAlias)` if `alias` already maps to another
    /// canonical GP.
    pub fn add_gp_alias(&self, canonical: &str, alias: &str) -> FundLinkResult<bool> {
        let mut guard = self.state.write().map_err(|_| lock_err("registry.add_gp_alias"))?;
        let state = &mut *guard;

        if !state.gp_aliases.insert(canonical, alias)? {
            return Ok(false);
        }
        state.dirty_gp_aliases.push(GpAlias {
            alias: alias.trim().to_string(),
            canonical: canonical.trim().to_string(),
        });

        let mut rekeyed = 0_usize;
        for (ordinal, fund) in state.funds.iter_mut().enumerate() {
            let Some(raw) = fund.general_partner_raw.as_deref() else {
                continue;
            };
            let key = state.gp_aliases.canonical_key(raw);
            if key == fund.general_partner_key {
                continue;
            }
            if let Some(old) = fund.general_partner_key.as_deref() {
                state.index.remove_gp(ordinal, old);
            }
            if let Some(new) = key.as_deref() {
                state.index.add_gp(ordinal, new);
            }
            fund.general_partner_key = key;
            state.dirty_funds.insert(ordinal);
            rekeyed += 1;
        }

        info!(canonical, alias, rekeyed, "GP alias added");
        Ok(true)
    }

    fn resolve_locked(&self, state: &mut RegistryState, record: &RawFundRecord) -> FundLinkResult<Resolved> {
        let incoming = normalize_record(record, &state.gp_aliases);
        let key = AliasKey::new(&incoming.raw_name, &incoming.source_id);

        if let Some(&target) = self.overrides.get(&key) {
            if let Some(&ordinal) = state.by_id.get(&target) {
                return match sequence_veto(&state.funds[ordinal], &incoming) {
                    None => Ok(self.link_manual(state, ordinal, &incoming, &key, "configured override", false)),
                    Some(violation) => {
                        warn!(
                            raw_name = %incoming.raw_name,
                            source = %incoming.source_id,
                            target = %target,
                            "override vetoed by sequence mismatch"
                        );
                        self.fallback(state, &incoming, &key, ordinal, violation)
                    }
                };
            }
            warn!(alias = %key, target = %target, "override target unknown, ignoring");
        }

        if state.aliases.contains_key(&key) {
            return self.replay_alias(state, &incoming, &key, Vec::new());
        }

        let scan = self.scan(state, &incoming);
        if let Some(best) = scan.best {
            if let Some(types) = link_types(best.evaluation.outcome) {
                return Ok(Self::link_computed(state, best, types, &incoming));
            }
        }

        let closest = scan
            .closest
            .filter(|c| c.evaluation.signals.name_similarity >= self.policy().name_threshold)
            .map(|c| (state.funds[c.ordinal].id, c.evaluation.signals));
        Ok(self.create(state, &incoming, Vec::new(), closest))
    }

    /// A vetoed manual link: replay the alias if known, otherwise a new fund.
    fn fallback(
        &self,
        state: &mut RegistryState,
        incoming: &NormalizedRecord,
        key: &AliasKey,
        vetoed: usize,
        violation: ResolutionError,
    ) -> FundLinkResult<Resolved> {
        if state.aliases.contains_key(key) {
            return self.replay_alias(state, incoming, key, vec![violation]);
        }
        let candidate = &state.funds[vetoed];
        let signals = self.scorer.score(candidate, incoming);
        let candidate = Some((candidate.id, signals));
        Ok(self.create(state, incoming, vec![violation], candidate))
    }

    fn scan(&self, state: &RegistryState, incoming: &NormalizedRecord) -> Scan {
        let pool = state
            .index
            .candidates(&incoming.name.tokens, incoming.gp_key.as_deref());
        let mut scan = Scan::default();

        for &ordinal in &pool {
            let Some(fund) = state.funds.get(ordinal) else {
                continue;
            };
            let evaluation = self.scorer.evaluate(fund, incoming, false);
            let scored = Scored { ordinal, evaluation };

            if scan.best.map_or(true, |b| outranks(&evaluation, &b.evaluation)) {
                scan.best = Some(scored);
            }
            if scan.closest.map_or(true, |c| {
                evaluation.signals.name_similarity > c.evaluation.signals.name_similarity
            }) {
                scan.closest = Some(scored);
            }
        }

        debug!(
            raw_name = %incoming.raw_name,
            source = %incoming.source_id,
            pool = pool.len(),
            best = %scan.best.map_or(MatchOutcome::None, |b| b.evaluation.outcome),
            "candidate pool scored"
        );
        scan
    }

    fn replay_alias(
        &self,
        state: &mut RegistryState,
        incoming: &NormalizedRecord,
        key: &AliasKey,
        mut issues: Vec<ResolutionError>,
    ) -> FundLinkResult<Resolved> {
        let existing = state
            .aliases
            .get(key)
            .map(|a| a.fund_id)
            .ok_or_else(|| FundLinkError::internal(format!("alias {key} vanished")))?;
        let ordinal = *state
            .by_id
            .get(&existing)
            .ok_or_else(|| FundLinkError::internal(format!("alias {key} points at missing fund {existing}")))?;
        debug!(alias = %key, fund_id = %existing, "alias hit");

        let own_signals = self.scorer.score(&state.funds[ordinal], incoming);
        let own_outcome = self
            .scorer
            .decide(&state.funds[ordinal], incoming, &own_signals, false);

        let mut decisions = Vec::new();
        let mut needs_review = false;

        if let Some(best) = self.scan(state, incoming).best {
            let computed = state.funds[best.ordinal].id;
            let outcome = best.evaluation.outcome;
            if computed != existing
                && matches!(outcome, MatchOutcome::Exact | MatchOutcome::FuzzyAuto)
                && outcome > own_outcome
            {
                issues.push(ResolutionError::DuplicateAliasConflict {
                    raw_name: incoming.raw_name.clone(),
                    source_id: incoming.source_id.clone(),
                    existing,
                    computed,
                });
                needs_review = true;

                if state.reported_conflicts.insert((key.clone(), computed)) {
                    warn!(
                        alias = %key,
                        existing = %existing,
                        computed = %computed,
                        outcome = %outcome,
                        "alias conflicts with computed match, keeping existing mapping"
                    );
                    decisions.push(
                        decision(incoming, DecisionOutcome::AliasConflict, existing)
                            .with_candidate(computed, best.evaluation.signals)
                            .with_note(format!("computed {outcome} target {computed} ignored"))
                            .flagged(),
                    );
                }
            }
        }

        let backfilled = Self::backfill(state, ordinal, incoming);
        if !backfilled.is_empty() {
            decisions.push(
                decision(incoming, DecisionOutcome::Alias, existing)
                    .with_candidate(existing, own_signals)
                    .with_backfilled(backfilled),
            );
        }

        Ok(Resolved {
            result: ResolutionResult {
                fund_id: existing,
                match_type: MatchType::Alias,
                created_new: false,
                confidence: 1.0,
                needs_review,
                issues,
                audit_recorded: true,
            },
            decisions,
        })
    }

    fn link_computed(
        state: &mut RegistryState,
        best: Scored,
        (match_type, outcome): (MatchType, DecisionOutcome),
        incoming: &NormalizedRecord,
    ) -> Resolved {
        let Scored { ordinal, evaluation } = best;
        let fund_id = state.funds[ordinal].id;
        let signals = evaluation.signals;

        state.attach_alias(Alias::new(fund_id, &incoming.raw_name, &incoming.source_id));
        let backfilled = Self::backfill(state, ordinal, incoming);
        let needs_review = evaluation.outcome == MatchOutcome::FuzzyFlagged;

        info!(
            raw_name = %incoming.raw_name,
            source = %incoming.source_id,
            fund_id = %fund_id,
            outcome = %evaluation.outcome,
            similarity = signals.name_similarity,
            "linked to existing fund"
        );

        let mut logged = decision(incoming, outcome, fund_id)
            .with_candidate(fund_id, signals)
            .with_backfilled(backfilled);
        if needs_review {
            logged = logged.flagged();
        }

        Resolved {
            result: ResolutionResult {
                fund_id,
                match_type,
                created_new: false,
                confidence: Scorer::confidence(evaluation.outcome, &signals),
                needs_review,
                issues: Vec::new(),
                audit_recorded: true,
            },
            decisions: vec![logged],
        }
    }

    fn link_manual(
        &self,
        state: &mut RegistryState,
        ordinal: usize,
        incoming: &NormalizedRecord,
        key: &AliasKey,
        note: &str,
        always_log: bool,
    ) -> Resolved {
        let fund_id = state.funds[ordinal].id;
        let signals = self.scorer.score(&state.funds[ordinal], incoming);
        let alias = Alias::new(fund_id, &incoming.raw_name, &incoming.source_id);

        let mut note = note.to_string();
        let changed = match state.aliases.get(key).map(|a| a.fund_id) {
            Some(previous) if previous == fund_id => false,
            Some(previous) => {
                state.repoint_alias(alias);
                note = format!("{note}; repointed from {previous}");
                true
            }
            None => {
                state.attach_alias(alias);
                true
            }
        };
        let backfilled = Self::backfill(state, ordinal, incoming);

        let mut decisions = Vec::new();
        if changed || always_log || !backfilled.is_empty() {
            info!(alias = %key, fund_id = %fund_id, note = %note, "manual link applied");
            decisions.push(
                decision(incoming, DecisionOutcome::ManualOverride, fund_id)
                    .with_candidate(fund_id, signals)
                    .with_backfilled(backfilled)
                    .with_note(note),
            );
        }

        Resolved {
            result: ResolutionResult {
                fund_id,
                match_type: MatchType::ManualOverride,
                created_new: false,
                confidence: 1.0,
                needs_review: false,
                issues: Vec::new(),
                audit_recorded: true,
            },
            decisions,
        }
    }

    fn create(
        &self,
        state: &mut RegistryState,
        incoming: &NormalizedRecord,
        issues: Vec<ResolutionError>,
        candidate: Option<(FundId, Signals)>,
    ) -> Resolved {
        let class = classify_strategy(&incoming.raw_name);
        let (gp_raw, gp_key) = match incoming.gp_raw.clone() {
            Some(raw) => (Some(raw), incoming.gp_key.clone()),
            None if self.policy().infer_gp_from_name => {
                let inferred = gp_from_fund_name(&incoming.raw_name);
                let key = inferred.as_deref().and_then(|gp| state.gp_aliases.canonical_key(gp));
                if let Some(gp) = &inferred {
                    debug!(raw_name = %incoming.raw_name, gp = %gp, "inferred general partner from fund name");
                }
                (inferred, key)
            }
            None => (None, None),
        };
        let fund = CanonicalFund {
            id: FundId::new(),
            display_name: display_name(&incoming.raw_name),
            raw_name: incoming.raw_name.clone(),
            name_tokens: incoming.name.tokens.clone(),
            sequence_number: incoming.name.sequence_number,
            general_partner_raw: gp_raw,
            general_partner_key: gp_key,
            vintage_year: incoming.vintage_year,
            asset_class: Some(class.asset_class.to_string()),
            sub_strategy: class.sub_strategy.map(str::to_string),
            seeded_by: incoming.source_id.clone(),
            created_at: Utc::now(),
        };
        let fund_id = fund.id;
        let ordinal = state.push_fund(fund);
        state.dirty_funds.insert(ordinal);
        state.attach_alias(Alias::new(fund_id, &incoming.raw_name, &incoming.source_id));

        let low = is_low_distinctiveness(&incoming.name.tokens);
        info!(
            raw_name = %incoming.raw_name,
            source = %incoming.source_id,
            fund_id = %fund_id,
            low_distinctiveness = low,
            "created canonical fund"
        );

        let mut logged = decision(incoming, DecisionOutcome::New, fund_id);
        if let Some((candidate_id, signals)) = candidate {
            logged = logged.with_candidate(candidate_id, signals);
        }
        if let Some(issue) = issues.first() {
            logged = logged.with_note(issue.to_string());
        }

        Resolved {
            result: ResolutionResult {
                fund_id,
                match_type: MatchType::New,
                created_new: true,
                confidence: if low { 0.5 } else { 1.0 },
                needs_review: low,
                issues,
                audit_recorded: true,
            },
            decisions: vec![logged],
        }
    }

    /// Fills unset fund fields from the incoming record.
    fn backfill(state: &mut RegistryState, ordinal: usize, incoming: &NormalizedRecord) -> Vec<BackfillField> {
        let patch = patch_from(incoming);
        let fund = &mut state.funds[ordinal];
        let filled = fund.fill_gaps(&patch);
        if filled.is_empty() {
            return filled;
        }

        if filled.contains(&BackfillField::GeneralPartner) {
            if let Some(gp) = fund.general_partner_key.as_deref() {
                state.index.add_gp(ordinal, gp);
            }
        }
        debug!(fund_id = %fund.id, fields = ?filled, "backfilled fund fields");
        state.dirty_funds.insert(ordinal);
        filled
    }

    fn commit(&self, resolved: Resolved) -> ResolutionResult {
        let Resolved { mut result, decisions } = resolved;
        for logged in decisions {
            let outcome = logged.outcome;
            if let Err(error) = self.log.record(logged) {
                self.audit_incomplete.store(true, std::sync::atomic::Ordering::SeqCst);
                result.audit_recorded = false;
                warn!(
                    fund_id = %result.fund_id,
                    outcome = %outcome,
                    error = %error,
                    "decision log write failed, run is audit-incomplete"
                );
            }
        }
        result
    }
}
