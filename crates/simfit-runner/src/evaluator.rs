//! Trial evaluation: dispatch, parse and score one parameter vector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use simfit_core::{
    read_run_output, rmse, ParamVector, ParameterTable, RunStatus, TargetSeries,
};
use tracing::warn;

use crate::dispatcher::Dispatcher;

/// What one evaluated trial produced.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Run id consumed by the trial, when a run was dispatched.
    pub run_id: Option<u64>,

    pub status: RunStatus,

    /// RMSE against the target; present only for completed runs.
    pub score: Option<f64>,

    pub duration: Duration,

    /// Why the trial could not be scored.
    pub error: Option<String>,
}

impl TrialOutcome {
    pub fn completed(run_id: u64, score: f64, duration: Duration) -> Self {
        Self {
            run_id: Some(run_id),
            status: RunStatus::Completed,
            score: Some(score),
            duration,
            error: None,
        }
    }

    pub fn rejected(run_id: Option<u64>, status: RunStatus, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            run_id,
            status,
            score: None,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Turns a physical parameter vector into a scored outcome.
///
/// Implementations never fail: every problem is folded into the returned
/// outcome so the calibration loop can keep going.
#[async_trait]
pub trait TrialEvaluator: Send + Sync {
    async fn evaluate(&self, physical: &ParamVector) -> TrialOutcome;
}

/// Evaluator backed by the external simulator.
pub struct SimulatorEvaluator {
    dispatcher: Dispatcher,
    table: Arc<ParameterTable>,
    target: Arc<TargetSeries>,
}

impl SimulatorEvaluator {
    pub fn new(dispatcher: Dispatcher, table: Arc<ParameterTable>, target: Arc<TargetSeries>) -> Self {
        Self {
            dispatcher,
            table,
            target,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl TrialEvaluator for SimulatorEvaluator {
    async fn evaluate(&self, physical: &ParamVector) -> TrialOutcome {
        let invocation = match self.dispatcher.dispatch(physical).await {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(error = %e, "dispatch failed before the simulator ran");
                return TrialOutcome::rejected(None, RunStatus::Failed, Duration::ZERO, e.to_string());
            }
        };
        let run_id = invocation.run_id;
        let duration = invocation.duration;

        if let Err(e) = invocation.check() {
            return TrialOutcome::rejected(Some(run_id), RunStatus::Failed, duration, e.to_string());
        }

        let parsed = read_run_output(self.dispatcher.layout(), &self.table, run_id);
        let status = RunStatus::classify(&parsed, self.target.len());
        match parsed {
            Ok(output) if status.is_scoreable() => match rmse(&output.values, self.target.values()) {
                Ok(score) if score.is_finite() => TrialOutcome::completed(run_id, score, duration),
                Ok(score) => TrialOutcome::rejected(
                    Some(run_id),
                    RunStatus::Incomplete,
                    duration,
                    format!("score {score} is not finite"),
                ),
                Err(e) => TrialOutcome::rejected(Some(run_id), RunStatus::Incomplete, duration, e.to_string()),
            },
            Ok(output) => TrialOutcome::rejected(
                Some(run_id),
                status,
                duration,
                format!(
                    "expected {} output values, found {}",
                    self.target.len(),
                    output.values.len()
                ),
            ),
            Err(e) => TrialOutcome::rejected(Some(run_id), status, duration, e.to_string()),
        }
    }
}
