//! In-memory decision log.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AuditError;
use crate::fund::FundId;

use super::{DecisionLog, MatchDecision};

fn lock_err(context: &'static str) -> AuditError {
    AuditError::Backend {
        message: format!("poisoned lock: {context}"),
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<MatchDecision>,
    by_fund: HashMap<FundId, Vec<usize>>,
}

/// Thread-safe, process-local decision log.
#[derive(Debug, Default)]
pub struct InMemoryDecisionLog {
    state: RwLock<LogState>,
}

impl InMemoryDecisionLog {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Backend`] if the lock is poisoned.
    pub fn entries(&self) -> Result<Vec<MatchDecision>, AuditError> {
        let state = self.state.read().map_err(|_| lock_err("audit.entries"))?;
        Ok(state.entries.clone())
    }
}

impl DecisionLog for InMemoryDecisionLog {
    fn record(&self, decision: MatchDecision) -> Result<(), AuditError> {
        let mut state = self.state.write().map_err(|_| lock_err("audit.record"))?;
        let idx = state.entries.len();
        state.by_fund.entry(decision.fund_id).or_default().push(idx);
        if let Some(candidate) = decision.candidate_id {
            if candidate != decision.fund_id {
                state.by_fund.entry(candidate).or_default().push(idx);
            }
        }
        state.entries.push(decision);
        Ok(())
    }

    fn for_fund(&self, fund_id: FundId) -> Result<Vec<MatchDecision>, AuditError> {
        let state = self.state.read().map_err(|_| lock_err("audit.for_fund"))?;
        let Some(indices) = state.by_fund.get(&fund_id) else {
            return Ok(Vec::new());
        };
        Ok(indices
            .iter()
            .filter_map(|&i| state.entries.get(i).cloned())
            .collect())
    }

    fn review_queue(&self) -> Result<Vec<MatchDecision>, AuditError> {
        let state = self.state.read().map_err(|_| lock_err("audit.review_queue"))?;
        Ok(state
            .entries
            .iter()
            .filter(|d| d.is_review_item())
            .cloned()
            .collect())
    }

    fn len(&self) -> Result<usize, AuditError> {
        let state = self.state.read().map_err(|_| lock_err("audit.len"))?;
        Ok(state.entries.len())
    }
}
