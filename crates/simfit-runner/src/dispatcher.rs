//! Simulator dispatch: one blocking child process per run.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use simfit_core::{DurationLog, ParamVector, Result, RunLayout, SimfitError};
use tokio::process::Command;
use tracing::{info, warn};

use crate::command::SimulatorCommand;
use crate::sequence::RunIdSequence;

/// How a simulator process ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code, or `None` when killed by a signal.
    NonZero { code: Option<i32> },
    /// Killed after exceeding the configured timeout.
    TimedOut { limit_secs: u64 },
    /// The process could not be started.
    SpawnFailed { reason: String },
    /// The process started but its exit status could not be collected.
    WaitFailed { reason: String },
}

/// Result of one simulator invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub run_id: u64,

    pub outcome: ExitOutcome,

    /// Captured stdout/stderr.
    pub log_path: PathBuf,

    /// Where the simulator is expected to write its result file.
    pub result_path: PathBuf,

    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
}

impl Invocation {
    /// Whether the simulator exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.outcome == ExitOutcome::Success
    }

    /// Turn a failed outcome into its error.
    pub fn check(&self) -> Result<()> {
        match &self.outcome {
            ExitOutcome::Success => Ok(()),
            ExitOutcome::NonZero { code } => Err(SimfitError::ExternalProcess {
                run_id: self.run_id,
                code: *code,
            }),
            ExitOutcome::TimedOut { limit_secs } => Err(SimfitError::Timeout {
                run_id: self.run_id,
                limit_secs: *limit_secs,
            }),
            ExitOutcome::SpawnFailed { reason } => Err(SimfitError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to launch simulator for run {}: {reason}", self.run_id),
            ))),
            ExitOutcome::WaitFailed { reason } => Err(SimfitError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("lost track of simulator for run {}: {reason}", self.run_id),
            ))),
        }
    }
}

/// Launches the simulator, one run at a time.
pub struct Dispatcher {
    command: SimulatorCommand,
    layout: RunLayout,
    sequence: RunIdSequence,
    durations: DurationLog,
}

impl Dispatcher {
    /// Dispatcher whose run ids start at 1.
    pub fn new(command: SimulatorCommand, layout: RunLayout) -> Self {
        Self::with_sequence(command, layout, RunIdSequence::new())
    }

    /// Dispatcher with an explicit id sequence.
    pub fn with_sequence(command: SimulatorCommand, layout: RunLayout, sequence: RunIdSequence) -> Self {
        let durations = DurationLog::new(layout.duration_log_path());
        Self {
            command,
            layout,
            sequence,
            durations,
        }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn command(&self) -> &SimulatorCommand {
        &self.command
    }

    /// The id the next dispatch will use.
    pub fn next_run_id(&self) -> u64 {
        self.sequence.peek()
    }

    /// Run the simulator for one physical parameter vector and wait for it.
    ///
    /// Errors are returned only for local I/O failures (output directory,
    /// log file, duration log). Simulator failures are reported through
    /// [`Invocation::outcome`].
    pub async fn dispatch(&self, physical: &ParamVector) -> Result<Invocation> {
        let run_id = self.sequence.reserve();
        std::fs::create_dir_all(self.layout.output_dir())?;

        let log_path = self.layout.log_path(run_id);
        let result_path = self.layout.result_path(run_id);
        // A result file left by an earlier study must not be scored for this run.
        match std::fs::remove_file(&result_path) {
            Ok(()) => warn!(
                run_id = run_id,
                path = %result_path.display(),
                "Removed stale result file before dispatch"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let log = std::fs::File::create(&log_path)?;
        let log_err = log.try_clone()?;

        info!(
            run_id = run_id,
            command = %self.command.render(run_id, physical),
            "Dispatching simulator"
        );

        let start = Instant::now();
        let spawned = Command::new(&self.command.program)
            .args(self.command.argv(run_id, physical))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn();

        let outcome = match spawned {
            Ok(mut child) => {
                if self.command.timeout_secs > 0 {
                    let limit = Duration::from_secs(self.command.timeout_secs);
                    match tokio::time::timeout(limit, child.wait()).await {
                        Ok(status) => exit_outcome(status),
                        Err(_) => {
                            if let Err(e) = child.kill().await {
                                warn!(run_id = run_id, error = %e, "failed to kill timed-out simulator");
                            }
                            ExitOutcome::TimedOut {
                                limit_secs: self.command.timeout_secs,
                            }
                        }
                    }
                } else {
                    exit_outcome(child.wait().await)
                }
            }
            Err(e) => ExitOutcome::SpawnFailed {
                reason: e.to_string(),
            },
        };

        let duration = start.elapsed();
        self.durations.append(run_id, duration)?;

        match &outcome {
            ExitOutcome::Success => info!(
                run_id = run_id,
                duration_secs = duration.as_secs_f64(),
                "Simulator finished"
            ),
            other => warn!(
                run_id = run_id,
                duration_secs = duration.as_secs_f64(),
                outcome = ?other,
                log = %log_path.display(),
                "Simulator did not finish cleanly"
            ),
        }

        Ok(Invocation {
            run_id,
            outcome,
            log_path,
            result_path,
            duration,
        })
    }
}

fn exit_outcome(status: std::io::Result<std::process::ExitStatus>) -> ExitOutcome {
    match status {
        Ok(status) if status.success() => ExitOutcome::Success,
        Ok(status) => ExitOutcome::NonZero {
            code: status.code(),
        },
        Err(e) => ExitOutcome::WaitFailed {
            reason: e.to_string(),
        },
    }
}
