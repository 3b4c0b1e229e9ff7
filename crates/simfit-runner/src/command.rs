//! Simulator command-line construction.

use serde::{Deserialize, Serialize};
use simfit_core::{ParamVector, SimulatorConfig};

/// The command template used to launch one simulator run.
///
/// Arguments are laid out as
/// `program args... <run_flag> <run_id> -<name> <value> ...`
/// with parameters in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatorCommand {
    /// Executable to launch.
    pub program: String,

    /// Fixed leading arguments.
    pub args: Vec<String>,

    /// Flag preceding the run id.
    pub run_flag: String,

    /// Timeout in seconds (0 = wait indefinitely).
    pub timeout_secs: u64,
}

impl SimulatorCommand {
    /// Create a command with the default `-num` run flag and no timeout.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            run_flag: "-num".to_string(),
            timeout_secs: 0,
        }
    }

    /// Set the per-run wall-clock limit.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Arguments following the program name for one run.
    pub fn argv(&self, run_id: u64, physical: &ParamVector) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push(self.run_flag.clone());
        argv.push(run_id.to_string());
        for (name, value) in physical.iter() {
            argv.push(format!("-{name}"));
            argv.push(value.to_string());
        }
        argv
    }

    /// Full command line for logging.
    pub fn render(&self, run_id: u64, physical: &ParamVector) -> String {
        std::iter::once(self.program.clone())
            .chain(self.argv(run_id, physical))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&SimulatorConfig> for SimulatorCommand {
    fn from(config: &SimulatorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            run_flag: config.run_flag.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}
