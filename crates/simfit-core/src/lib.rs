//! simfit core library
//!
//! The data and control contract of the calibration loop:
//! - `param`: parameter specs, the normalized <-> physical codec, transforms
//! - `target`: experimental target series loading
//! - `output`: run directory layout and result-file parsing
//! - `score`: RMSE scoring
//! - `archive`: offline aggregation of historical runs
//! - `export`: CSV export and per-run plot data
//! - `config`: TOML study configuration

pub mod archive;
pub mod config;
pub mod durations;
pub mod error;
pub mod export;
pub mod obs;
pub mod output;
pub mod param;
pub mod run;
pub mod score;
pub mod target;
pub mod telemetry;

pub use archive::{ArchiveAggregator, ExcludedRun, RunRow, RunTable};
pub use config::{SimulatorConfig, StudyConfig};
pub use durations::DurationLog;
pub use error::{Result, SimfitError};
pub use export::{render_run_table, write_plot_data, write_run_table_csv};
pub use obs::{
    emit_run_excluded, emit_study_finished, emit_trial_finished, emit_trial_started, RunSpan,
};
pub use output::{parse_result_file, read_run_output, RunLayout, RunOutput};
pub use param::{denormalize, normalize, ParamValue, ParamVector, ParameterSpec, ParameterTable, Transform};
pub use run::{RunRecord, RunStatus};
pub use score::rmse;
pub use target::TargetSeries;
pub use telemetry::{init_tracing, LogFormat};

/// simfit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
