//! Structured observability hooks for the calibration lifecycle.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for trial start/finish, archive exclusions and the
//!   end of a study
//!
//! Events are emitted at `info!` level except exclusions and trial
//! failures, which are `warn!`.

use tracing::{info, warn};

use crate::param::ParamVector;
use crate::run::RunStatus;

/// RAII guard that enters a run-scoped tracing span.
///
/// ```ignore
/// let _span = RunSpan::enter(12);
/// // every event emitted now carries run_id = 12
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: u64) -> Self {
        let span = tracing::info_span!("simfit.run", run_id = run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a trial was proposed and is about to be evaluated.
pub fn emit_trial_started(trial: usize, physical: &ParamVector) {
    let parameters: Vec<String> = physical
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    info!(
        event = "trial.started",
        trial = trial,
        parameters = %parameters.join(" "),
    );
}

/// Emit event: a trial finished with its status and reported score.
pub fn emit_trial_finished(trial: usize, run_id: u64, status: RunStatus, score: f64, duration_secs: f64) {
    if status.is_scoreable() {
        info!(
            event = "trial.finished",
            trial = trial,
            run_id = run_id,
            status = %status,
            score = score,
            duration_secs = duration_secs,
        );
    } else {
        warn!(
            event = "trial.finished",
            trial = trial,
            run_id = run_id,
            status = %status,
            score = score,
            duration_secs = duration_secs,
        );
    }
}

/// Emit event: a run was left out of the aggregated table.
pub fn emit_run_excluded(run_id: u64, status: RunStatus, reason: &str) {
    warn!(
        event = "archive.excluded",
        run_id = run_id,
        status = %status,
        reason = %reason,
        "Mismatch or unreadable output detected at run #{run_id}",
    );
}

/// Emit event: the study reached its trial budget.
pub fn emit_study_finished(trials: usize, completed: usize, best_run: Option<u64>, best_score: Option<f64>) {
    info!(
        event = "study.finished",
        trials = trials,
        completed = completed,
        best_run = ?best_run,
        best_score = ?best_score,
    );
}
