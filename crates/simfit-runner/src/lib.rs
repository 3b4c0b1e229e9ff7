//! simfit runner
//!
//! Live side of the calibration loop:
//! - `command` / `dispatcher`: launch the external simulator, one run at a time
//! - `evaluator`: dispatch, parse and score one parameter vector
//! - `optimizer`: suggest/observe search over the unit box
//! - `study`: the trial loop
//! - `summary`: the `best.json` artifact

pub mod command;
pub mod dispatcher;
pub mod evaluator;
pub mod optimizer;
pub mod sequence;
pub mod study;
pub mod summary;

pub use command::SimulatorCommand;
pub use dispatcher::{Dispatcher, ExitOutcome, Invocation};
pub use evaluator::{SimulatorEvaluator, TrialEvaluator, TrialOutcome};
pub use optimizer::{Optimizer, RandomSearch};
pub use sequence::RunIdSequence;
pub use study::{run_study, StudyOptions, StudyResult, TrialRecord};
pub use summary::{read_summary_json, write_summary_json, BestTrial, StudySummary};
