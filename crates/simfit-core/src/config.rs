//! Study configuration loaded from TOML.
//!
//! ```toml
//! target_path = "data.csv"
//! output_dir = "output"
//! max_trials = 400
//! seed = 7
//!
//! [simulator]
//! program = "mpirun"
//! args = ["-n", "8", "FreeFem++-mpi", "ff/mg_3D.edp"]
//! timeout_secs = 3600
//!
//! [[parameters]]
//! name = "k2"
//! lower = 6.0
//! upper = 15.0
//! transform = "log10"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SimfitError};
use crate::param::{ParameterSpec, ParameterTable, Transform};

/// How the external simulator is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Executable to launch.
    pub program: String,

    /// Fixed leading arguments (before the run id and parameters).
    #[serde(default)]
    pub args: Vec<String>,

    /// Flag that precedes the run id.
    #[serde(default = "default_run_flag")]
    pub run_flag: String,

    /// Wall-clock limit per run in seconds; 0 disables the limit.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            program: "mpirun".to_string(),
            args: ["-n", "8", "FreeFem++-mpi", "ff/mg_3D.edp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            run_flag: default_run_flag(),
            timeout_secs: 0,
        }
    }
}

/// Everything needed to run or aggregate one study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    #[serde(default = "default_target_path")]
    pub target_path: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,

    #[serde(default = "default_max_trials")]
    pub max_trials: usize,

    /// Sampler seed; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Score reported to the optimizer for failed or incomplete trials.
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default = "default_parameters")]
    pub parameters: Vec<ParameterSpec>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            target_path: default_target_path(),
            output_dir: default_output_dir(),
            export_path: default_export_path(),
            summary_path: default_summary_path(),
            max_trials: default_max_trials(),
            seed: None,
            failure_penalty: default_failure_penalty(),
            simulator: SimulatorConfig::default(),
            parameters: default_parameters(),
        }
    }
}

impl StudyConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StudyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SimfitError::MissingFile {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.parameter_table()?;
        if self.simulator.program.trim().is_empty() {
            return Err(SimfitError::InvalidConfig(
                "simulator.program must not be empty".to_string(),
            ));
        }
        if self.max_trials == 0 {
            return Err(SimfitError::InvalidConfig(
                "max_trials must be at least 1".to_string(),
            ));
        }
        if !self.failure_penalty.is_finite() {
            return Err(SimfitError::InvalidConfig(
                "failure_penalty must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parameter_table(&self) -> Result<ParameterTable> {
        ParameterTable::new(self.parameters.clone())
    }
}

fn default_run_flag() -> String {
    "-num".to_string()
}

fn default_target_path() -> PathBuf {
    PathBuf::from("data.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_export_path() -> PathBuf {
    PathBuf::from("export_dataframe.csv")
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("best.json")
}

fn default_max_trials() -> usize {
    400
}

fn default_failure_penalty() -> f64 {
    1e6
}

/// Four-parameter table matching the stock `ff/mg_3D.edp` model.
fn default_parameters() -> Vec<ParameterSpec> {
    vec![
        spec("k1", 1.0, 10.0, Transform::Identity),
        spec("k2", 6.0, 15.0, Transform::Log10),
        spec("dmg", 1e-4, 1e-2, Transform::Identity),
        spec("dcl", 1e-3, 6e-1, Transform::Identity),
    ]
}

fn spec(name: &str, lower: f64, upper: f64, transform: Transform) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        lower,
        upper,
        transform,
    }
}
