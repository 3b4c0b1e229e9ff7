//! Run records and status classification.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimfitError};
use crate::output::RunOutput;
use crate::param::ParamVector;

/// Lifecycle state of a run, derived from the invocation result, the
/// presence of its result file and whether the output matches the target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Simulator launched; result not yet inspected.
    Dispatched,
    /// Result parsed and series length matches the target.
    Completed,
    /// Result present but short, partial or unparseable.
    Incomplete,
    /// Simulator failed, timed out or never wrote a result file.
    Failed,
}

impl RunStatus {
    /// Classify a parse attempt against the expected series length.
    pub fn classify(parsed: &Result<RunOutput>, expected_len: usize) -> Self {
        match parsed {
            Ok(output) if output.values.len() == expected_len => RunStatus::Completed,
            Ok(_) => RunStatus::Incomplete,
            Err(SimfitError::MissingResultFile { .. }) => RunStatus::Failed,
            Err(_) => RunStatus::Incomplete,
        }
    }

    /// Whether a run in this state carries a fit error.
    pub fn is_scoreable(self) -> bool {
        self == RunStatus::Completed
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Dispatched => "dispatched",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One simulator run as seen by the calibration loop or the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: u64,

    /// Physical parameter vector passed to the simulator.
    pub parameters: ParamVector,

    /// Simulated output series (empty when the run produced nothing).
    pub output: Vec<f64>,

    /// Wall-clock seconds, when known.
    pub duration_secs: Option<f64>,

    /// RMSE against the target; absent unless the run completed.
    pub error: Option<f64>,

    pub status: RunStatus,
}

impl RunRecord {
    /// A freshly launched run.
    pub fn dispatched(run_id: u64, parameters: ParamVector) -> Self {
        Self {
            run_id,
            parameters,
            output: Vec::new(),
            duration_secs: None,
            error: None,
            status: RunStatus::Dispatched,
        }
    }

    /// Mark the run as completed with its output and fit error.
    pub fn complete(&mut self, output: Vec<f64>, error: f64) {
        self.output = output;
        self.error = Some(error);
        self.status = RunStatus::Completed;
    }

    /// Mark the run as not scoreable.
    pub fn reject(&mut self, status: RunStatus) {
        debug_assert!(!status.is_scoreable());
        self.error = None;
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn output(len: usize) -> RunOutput {
        RunOutput {
            run_id: 1,
            parameters: ParamVector::new(),
            times: vec![0.0; len],
            values: vec![0.0; len],
        }
    }

    #[test]
    fn test_classify_completed_and_incomplete() {
        assert_eq!(RunStatus::classify(&Ok(output(3)), 3), RunStatus::Completed);
        assert_eq!(RunStatus::classify(&Ok(output(2)), 3), RunStatus::Incomplete);
    }

    #[test]
    fn test_classify_missing_file_is_failed() {
        let parsed = Err(SimfitError::MissingResultFile {
            run_id: 1,
            path: PathBuf::from("output/result-1.txt"),
        });
        assert_eq!(RunStatus::classify(&parsed, 3), RunStatus::Failed);
    }

    #[test]
    fn test_classify_malformed_is_incomplete() {
        let parsed = Err(SimfitError::MalformedRecord {
            path: PathBuf::from("output/result-1.txt"),
            line: 4,
            reason: "partial line".to_string(),
        });
        assert_eq!(RunStatus::classify(&parsed, 3), RunStatus::Incomplete);
    }

    #[test]
    fn test_record_transitions() {
        let mut record = RunRecord::dispatched(5, ParamVector::new());
        assert_eq!(record.status, RunStatus::Dispatched);
        record.complete(vec![1.0], 0.25);
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.error, Some(0.25));
        record.reject(RunStatus::Failed);
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_status_serde_uppercase() {
        let json = serde_json::to_string(&RunStatus::Incomplete).unwrap();
        assert_eq!(json, "\"INCOMPLETE\"");
    }
}
