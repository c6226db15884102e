//! Concurrent multi-source batch runs.
//!
//! Each source gets its own worker thread and resolves its records in order;
//! all workers share one registry, whose write lock serializes the actual
//! fund/alias mutations. Results fan in over a bounded channel.

use std::thread;

use crossbeam_channel::{bounded, Sender};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FundLinkResult;
use crate::record::{MatchType, RawFundRecord, ResolutionResult};
use crate::registry::FundRegistry;

/// All records delivered by one source system in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBatch {
    /// Source system the records came from.
    pub source_id: String,
    /// Records in delivery order.
    pub records: Vec<RawFundRecord>,
}

impl SourceBatch {
    /// Creates a batch for `source_id`.
    #[must_use]
    pub fn new(source_id: impl Into<String>, records: Vec<RawFundRecord>) -> Self {
        Self {
            source_id: source_id.into(),
            records,
        }
    }
}

/// Resolution of one record, tagged with where it came from.
#[derive(Debug)]
pub struct RecordOutcome {
    /// Index of the batch in the submitted list.
    pub batch: usize,
    /// Position of the record within its batch.
    pub position: usize,
    /// Source system of the record.
    pub source_id: String,
    /// Raw fund name as delivered.
    pub raw_name: String,
    /// Resolution result or the per-record failure.
    pub result: FundLinkResult<ResolutionResult>,
}

/// A record that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Source system of the record.
    pub source_id: String,
    /// Position of the record within its batch.
    pub position: usize,
    /// Raw fund name as delivered.
    pub raw_name: String,
    /// Rendered error.
    pub error: String,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Records processed.
    pub records: usize,
    /// Exact links.
    pub exact: usize,
    /// Alias replays.
    pub alias: usize,
    /// Unflagged fuzzy links.
    pub fuzzy_auto: usize,
    /// Fuzzy links awaiting review.
    pub fuzzy_flagged: usize,
    /// Funds created.
    pub new: usize,
    /// Override links.
    pub manual_override: usize,
    /// Results marked for review.
    pub needs_review: usize,
    /// Results whose decision did not reach the log.
    pub unaudited: usize,
    /// Records that failed to resolve.
    pub failures: Vec<RecordFailure>,
    /// The registry's audit-incomplete flag at the end of the run.
    pub audit_incomplete: bool,
}

impl RunReport {
    fn tally(&mut self, outcome: &RecordOutcome) {
        self.records += 1;
        match &outcome.result {
            Ok(result) => {
                match result.match_type {
                    MatchType::Exact => self.exact += 1,
                    MatchType::Alias => self.alias += 1,
                    MatchType::FuzzyAuto => self.fuzzy_auto += 1,
                    MatchType::FuzzyFlagged => self.fuzzy_flagged += 1,
                    MatchType::New => self.new += 1,
                    MatchType::ManualOverride => self.manual_override += 1,
                }
                if result.needs_review {
                    self.needs_review += 1;
                }
                if !result.audit_recorded {
                    self.unaudited += 1;
                }
            }
            Err(e) => self.failures.push(RecordFailure {
                source_id: outcome.source_id.clone(),
                position: outcome.position,
                raw_name: outcome.raw_name.clone(),
                error: e.to_string(),
            }),
        }
    }

    /// Number of records that resolved without error.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.records - self.failures.len()
    }
}

/// Outcomes in submission order plus their summary.
#[derive(Debug)]
pub struct BatchRun {
    /// Per-record outcomes, ordered by batch then position.
    pub outcomes: Vec<RecordOutcome>,
    /// Aggregate counts.
    pub report: RunReport,
}

/// Runs several source batches against one registry.
#[derive(Debug)]
pub struct BatchResolver<'a> {
    registry: &'a FundRegistry,
    channel_capacity: usize,
}

fn resolve_batch(
    registry: &FundRegistry,
    batch_index: usize,
    batch: &SourceBatch,
    mut emit: impl FnMut(RecordOutcome) -> bool,
) {
    for (position, record) in batch.records.iter().enumerate() {
        let outcome = RecordOutcome {
            batch: batch_index,
            position,
            source_id: batch.source_id.clone(),
            raw_name: record.raw_fund_name.clone(),
            result: registry.resolve(record),
        };
        if !emit(outcome) {
            break;
        }
    }
}

impl<'a> BatchResolver<'a> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub fn new(registry: &'a FundRegistry) -> Self {
        Self {
            registry,
            channel_capacity: 1024,
        }
    }

    /// Sets the fan-in channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Resolves every batch, one worker thread per batch.
    ///
    /// A failing record is reported and the run continues.
    #[must_use]
    pub fn run(&self, batches: &[SourceBatch]) -> BatchRun {
        let registry = self.registry;
        let (tx, rx) = bounded::<RecordOutcome>(self.channel_capacity);
        let mut outcomes = Vec::with_capacity(batches.iter().map(|b| b.records.len()).sum());

        thread::scope(|scope| {
            let mut unspawned = Vec::new();
            for (index, batch) in batches.iter().enumerate() {
                let tx: Sender<RecordOutcome> = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("fundlink-{}", batch.source_id))
                    .spawn_scoped(scope, move || {
                        resolve_batch(registry, index, batch, |o| tx.send(o).is_ok());
                    });
                if let Err(e) = spawned {
                    warn!(source = %batch.source_id, error = %e, "worker spawn failed, resolving inline");
                    unspawned.push(index);
                }
            }
            drop(tx);

            outcomes.extend(rx.iter());

            for index in unspawned {
                resolve_batch(registry, index, &batches[index], |o| {
                    outcomes.push(o);
                    true
                });
            }
        });

        outcomes.sort_by_key(|o| (o.batch, o.position));

        let mut report = RunReport::default();
        for outcome in &outcomes {
            report.tally(outcome);
        }
        report.audit_incomplete = registry.audit_incomplete();

        info!(
            sources = batches.len(),
            records = report.records,
            new = report.new,
            flagged = report.fuzzy_flagged,
            failures = report.failures.len(),
            audit_incomplete = report.audit_incomplete,
            "batch run complete"
        );

        BatchRun { outcomes, report }
    }
}
