//! Persisted study summary (`best.json`).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simfit_core::{ParamVector, ParameterTable, Result};

use crate::study::{StudyResult, TrialRecord};

pub const SUMMARY_SCHEMA_VERSION: &str = "1";

/// Best trial section of the summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BestTrial {
    pub trial: usize,
    pub run_id: Option<u64>,
    pub score: f64,
    pub normalized: ParamVector,
    pub physical: ParamVector,
    /// Search-space values (log-scaled parameters shown as exponents).
    pub display: ParamVector,
}

/// Study summary artifact written at the end of `calibrate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudySummary {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub optimizer: String,
    pub total_trials: usize,
    pub completed: usize,
    pub failed: usize,
    pub duration_secs: f64,
    pub best: Option<BestTrial>,
    pub trials: Vec<TrialRecord>,
}

impl StudySummary {
    pub fn from_result(result: &StudyResult, table: &ParameterTable) -> Result<Self> {
        let best = match result.best() {
            Some(t) => Some(BestTrial {
                trial: t.trial,
                run_id: t.run_id,
                score: t.loss,
                normalized: t.normalized.clone(),
                physical: t.physical.clone(),
                display: table.to_display(&t.physical)?,
            }),
            None => None,
        };

        Ok(Self {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            optimizer: result.optimizer.clone(),
            total_trials: result.trials.len(),
            completed: result.completed_count(),
            failed: result.failed_count(),
            duration_secs: result.duration_secs,
            best,
            trials: result.trials.clone(),
        })
    }
}

/// Write the summary as pretty JSON.
pub fn write_summary_json(path: &Path, summary: &StudySummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Read a previously written summary.
pub fn read_summary_json(path: &Path) -> Result<StudySummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
