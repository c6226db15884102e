//! JSON-lines decision log.
//!
//! One decision per line, appended and flushed on every write. Queries re-read
//! the file, which is fine for review tooling and audit exports.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AuditError;
use crate::fund::FundId;

use super::{DecisionLog, MatchDecision};

/// File-backed append-only decision log.
#[derive(Debug)]
pub struct JsonlDecisionLog {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonlDecisionLog {
    /// Opens (or creates) a log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<MatchDecision>, AuditError> {
        // Serialize with writers so a half-written line is never read.
        let _guard = self.writer.lock().map_err(|_| AuditError::Backend {
            message: "poisoned lock: audit.jsonl.read".to_string(),
        })?;

        let reader = BufReader::new(File::open(&self.path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}

impl DecisionLog for JsonlDecisionLog {
    fn record(&self, decision: MatchDecision) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&decision)?;
        line.push('\n');

        let mut file = self.writer.lock().map_err(|_| AuditError::Backend {
            message: "poisoned lock: audit.jsonl.record".to_string(),
        })?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn for_fund(&self, fund_id: FundId) -> Result<Vec<MatchDecision>, AuditError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|d| d.concerns(fund_id))
            .collect())
    }

    fn review_queue(&self) -> Result<Vec<MatchDecision>, AuditError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(MatchDecision::is_review_item)
            .collect())
    }

    fn len(&self) -> Result<usize, AuditError> {
        Ok(self.read_all()?.len())
    }
}
