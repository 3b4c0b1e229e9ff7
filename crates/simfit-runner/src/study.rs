//! The calibration loop.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use simfit_core::{
    emit_study_finished, emit_trial_finished, emit_trial_started, ParamVector, ParameterTable,
    Result, RunSpan, RunStatus, SimfitError,
};
use tracing::info;

use crate::evaluator::TrialEvaluator;
use crate::optimizer::Optimizer;

/// Loop budget and failure policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyOptions {
    /// Number of trials to evaluate.
    pub max_trials: usize,

    /// Loss reported to the optimizer for trials that produced no score.
    pub failure_penalty: f64,
}

impl Default for StudyOptions {
    fn default() -> Self {
        Self {
            max_trials: 400,
            failure_penalty: 1e6,
        }
    }
}

/// One evaluated trial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialRecord {
    /// 1-based trial index within the study.
    pub trial: usize,

    pub run_id: Option<u64>,

    pub normalized: ParamVector,

    pub physical: ParamVector,

    pub status: RunStatus,

    /// RMSE, for completed runs.
    pub score: Option<f64>,

    /// Loss the optimizer saw (score, or the failure penalty).
    pub loss: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_secs: f64,
}

/// Result of a complete study.
#[derive(Debug, Clone)]
pub struct StudyResult {
    pub optimizer: String,

    pub trials: Vec<TrialRecord>,

    /// Total wall-clock time in seconds.
    pub duration_secs: f64,
}

impl StudyResult {
    /// Trial with the lowest finite score. Ties go to the earliest trial.
    pub fn best(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter_map(|t| t.score.filter(|s| s.is_finite()).map(|s| (s, t)))
            .min_by(|(a, ta), (b, tb)| a.total_cmp(b).then(ta.trial.cmp(&tb.trial)))
            .map(|(_, t)| t)
    }

    /// Number of trials that produced a score.
    pub fn completed_count(&self) -> usize {
        self.trials.iter().filter(|t| t.status.is_scoreable()).count()
    }

    /// Number of trials that did not.
    pub fn failed_count(&self) -> usize {
        self.trials.len() - self.completed_count()
    }
}

/// Run `options.max_trials` trials: suggest, decode, evaluate, observe.
///
/// A trial that cannot be scored reports `options.failure_penalty` to the
/// optimizer and the loop moves on. Only a malformed suggestion aborts.
pub async fn run_study(
    table: &ParameterTable,
    optimizer: &mut dyn Optimizer,
    evaluator: &dyn TrialEvaluator,
    options: &StudyOptions,
) -> Result<StudyResult> {
    if options.max_trials == 0 {
        return Err(SimfitError::InvalidConfig("max_trials must be at least 1".to_string()));
    }

    let start = Instant::now();
    let names = table.names();
    info!(
        optimizer = optimizer.name(),
        max_trials = options.max_trials,
        parameters = ?names,
        "Starting calibration study"
    );

    let mut trials = Vec::with_capacity(options.max_trials);
    for trial in 1..=options.max_trials {
        let suggestion = optimizer.suggest(&names);
        let normalized = table.vector_from_values(&suggestion)?;
        let physical = table.to_physical(&normalized)?;

        emit_trial_started(trial, &physical);
        let outcome = evaluator.evaluate(&physical).await;
        let run_id = outcome.run_id;
        let score = outcome.score.filter(|s| s.is_finite());
        let (status, error) = match outcome.score {
            Some(s) if score.is_none() => (RunStatus::Incomplete, Some(format!("score {s} is not finite"))),
            _ => (outcome.status, outcome.error),
        };
        let loss = score.unwrap_or(options.failure_penalty);
        optimizer.observe(&suggestion, loss);

        {
            let _span = run_id.map(RunSpan::enter);
            emit_trial_finished(
                trial,
                run_id.unwrap_or_default(),
                status,
                loss,
                outcome.duration.as_secs_f64(),
            );
        }

        trials.push(TrialRecord {
            trial,
            run_id,
            normalized,
            physical,
            status,
            score,
            loss,
            error,
            duration_secs: outcome.duration.as_secs_f64(),
        });
    }

    let result = StudyResult {
        optimizer: optimizer.name().to_string(),
        trials,
        duration_secs: start.elapsed().as_secs_f64(),
    };

    let best = result.best();
    emit_study_finished(
        result.trials.len(),
        result.completed_count(),
        best.and_then(|b| b.run_id),
        best.and_then(|b| b.score),
    );

    Ok(result)
}
