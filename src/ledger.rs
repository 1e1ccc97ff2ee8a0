// src/ledger.rs

//! The durable working/broken ledger.
//!
//! Two disjoint partitions keyed by fingerprint. [`Ledger::merge`] is a
//! pure function of the previous ledger and the current result set:
//! success lands in `working`, failure/timeout in `broken`, ignored and
//! parse-skipped commands in neither, and fingerprints absent from the
//! current results are dropped entirely. Running the merge twice with
//! identical inputs yields an identical ledger, which is what keeps
//! repeated `domd` invocations stable and diff-friendly.
//!
//! Persistence is JSON under `.domd/ledger.json`, written atomically via
//! a temp file and rename. Load and store failures are fatal: the engine
//! cannot safely report without a durable basis.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{DomdError, Result};
use crate::model::{ExecutionStatus, Fingerprint};
use crate::runner::CommandResult;

/// What the ledger remembers about one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub command_text: String,
    pub source: PathBuf,
    pub return_code: i32,
    /// Unix seconds of the run that first produced this entry's state.
    pub recorded_at: u64,
}

/// The run-to-run state: current project health as two disjoint
/// fingerprint partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub working: BTreeMap<Fingerprint, LedgerEntry>,
    pub broken: BTreeMap<Fingerprint, LedgerEntry>,
}

impl Ledger {
    /// Merge the previous run's ledger with this run's results.
    ///
    /// Pure: no IO, no clock reads beyond what the results carry. An
    /// entry whose partition and return code are unchanged keeps its
    /// original `recorded_at`, so an idempotent re-run produces a
    /// byte-identical ledger.
    pub fn merge(previous: &Ledger, results: &[CommandResult]) -> Ledger {
        let mut next = Ledger::default();

        for (command, result) in results {
            let fingerprint = result.fingerprint;
            match result.status {
                ExecutionStatus::Success => {
                    let entry = carry_or_new(previous.working.get(&fingerprint), command, result);
                    next.working.insert(fingerprint, entry);
                }
                ExecutionStatus::Failure | ExecutionStatus::Timeout => {
                    let entry = carry_or_new(previous.broken.get(&fingerprint), command, result);
                    next.broken.insert(fingerprint, entry);
                }
                ExecutionStatus::Ignored | ExecutionStatus::ParseSkipped => {
                    // Neither confirmed working nor broken this run.
                }
            }
        }

        next
    }

    pub fn is_all_working(&self) -> bool {
        self.broken.is_empty()
    }

    /// Load the prior run's ledger. A missing file is an empty ledger;
    /// anything else that goes wrong is fatal.
    pub fn load(path: &Path) -> Result<Ledger> {
        if !path.is_file() {
            debug!(path = %path.display(), "no previous ledger; starting empty");
            return Ok(Ledger::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("read failed: {e}"),
        })?;
        serde_json::from_str(&contents).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("parse failed: {e}"),
        })
    }

    /// Persist atomically: write a sibling temp file, then rename.
    pub fn store(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: "ledger path has no parent directory".into(),
        })?;
        std::fs::create_dir_all(parent).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("creating {}: {e}", parent.display()),
        })?;

        let json = serde_json::to_string_pretty(self).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("serialize failed: {e}"),
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("writing {}: {e}", tmp.display()),
        })?;
        std::fs::rename(&tmp, path).map_err(|e| DomdError::LedgerError {
            path: path.to_path_buf(),
            message: format!("renaming into place: {e}"),
        })?;

        info!(
            path = %path.display(),
            working = self.working.len(),
            broken = self.broken.len(),
            "ledger persisted"
        );
        Ok(())
    }
}

fn carry_or_new(
    previous: Option<&LedgerEntry>,
    command: &crate::model::Command,
    result: &crate::model::ExecutionResult,
) -> LedgerEntry {
    match previous {
        Some(entry) if entry.return_code == result.return_code => entry.clone(),
        _ => LedgerEntry {
            command_text: command.text.clone(),
            source: command.source.clone(),
            return_code: result.return_code,
            recorded_at: result.executed_at,
        },
    }
}
