//! simfit - simulator calibration CLI
//!
//! ## Commands
//!
//! - `calibrate`: run the optimization loop against the external simulator
//! - `aggregate`: collect archived runs, score them and export the table
//! - `params`: print the parameter table
//! - `codec`: map a vector between normalized and physical units

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use simfit_core::{
    render_run_table, write_plot_data, write_run_table_csv, ArchiveAggregator, LogFormat,
    ParamVector, ParameterTable, RunLayout, StudyConfig, TargetSeries,
};
use simfit_runner::{
    read_summary_json, run_study, write_summary_json, BestTrial, Dispatcher, RandomSearch,
    RunIdSequence, SimulatorCommand, SimulatorEvaluator, StudyOptions, StudySummary,
};

#[derive(Parser)]
#[command(name = "simfit")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Calibrate simulator parameters against experimental data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Study configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true, env = "SIMFIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the calibration loop
    Calibrate {
        /// Number of trials (overrides max_trials)
        #[arg(short = 'n', long)]
        trials: Option<usize>,

        /// Sampler seed
        #[arg(long)]
        seed: Option<u64>,

        /// Experimental target file
        #[arg(long)]
        target: Option<PathBuf>,

        /// Directory receiving simulator output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Where to write the study summary
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Continue numbering after the highest existing run id
        #[arg(long)]
        resume: bool,
    },

    /// Aggregate archived runs into a scored table
    Aggregate {
        /// Experimental target file
        #[arg(long)]
        target: Option<PathBuf>,

        /// Directory holding result files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// CSV export path
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Write per-run plot data (fig-<run>.csv) into this directory
        #[arg(long)]
        figures: Option<PathBuf>,
    },

    /// Print the parameter table
    Params,

    /// Convert a comma-separated vector between normalized and physical units
    Codec {
        /// Normalized values to map to physical units
        #[arg(long, conflicts_with = "to_normalized", required_unless_present = "to_normalized")]
        to_physical: Option<String>,

        /// Physical values to map to normalized units
        #[arg(long)]
        to_normalized: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    simfit_core::init_tracing(LogFormat::from_json_flag(cli.json), level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Calibrate {
            trials,
            seed,
            target,
            output_dir,
            summary,
            resume,
        } => {
            let mut config = config;
            if let Some(trials) = trials {
                config.max_trials = trials;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(target) = target {
                config.target_path = target;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(summary) = summary {
                config.summary_path = summary;
            }
            config.validate().context("Invalid study configuration")?;
            cmd_calibrate(&config, resume).await
        }
        Commands::Aggregate {
            target,
            output_dir,
            export,
            figures,
        } => {
            let mut config = config;
            if let Some(target) = target {
                config.target_path = target;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(export) = export {
                config.export_path = export;
            }
            cmd_aggregate(&config, figures.as_deref())
        }
        Commands::Params => cmd_params(&config),
        Commands::Codec {
            to_physical,
            to_normalized,
        } => {
            let table = config.parameter_table()?;
            let mapped = match (to_physical, to_normalized) {
                (Some(values), _) => codec_to_physical(&table, &values)?,
                (None, Some(values)) => codec_to_normalized(&table, &values)?,
                (None, None) => anyhow::bail!("one of --to-physical or --to-normalized is required"),
            };
            for (name, value) in mapped.iter() {
                println!("{name}={value}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<StudyConfig> {
    match path {
        Some(path) => StudyConfig::from_toml_path(path)
            .with_context(|| format!("Failed to load study config {:?}", path)),
        None => Ok(StudyConfig::default()),
    }
}

async fn cmd_calibrate(config: &StudyConfig, resume: bool) -> Result<()> {
    let table = Arc::new(config.parameter_table()?);
    let target = Arc::new(
        TargetSeries::load(&config.target_path)
            .with_context(|| format!("Failed to load target {:?}", config.target_path))?,
    );
    let layout = RunLayout::new(&config.output_dir);

    let next_free = layout
        .next_free_run_id()
        .context("Failed to scan output directory")?;
    let sequence = if resume {
        match previous_best(&config.summary_path) {
            Ok(Some(best)) => println!(
                "Previous best: run #{} error={:.6}",
                best.run_id.map(|id| id.to_string()).unwrap_or_default(),
                best.score
            ),
            Ok(None) => {}
            Err(e) => warn!(
                path = %config.summary_path.display(),
                error = %e,
                "Previous summary unreadable; it will be replaced"
            ),
        }
        RunIdSequence::starting_at(next_free)
    } else {
        if next_free > 1 {
            warn!(
                output_dir = %config.output_dir.display(),
                "Existing result files will be overwritten; pass --resume to keep them"
            );
        }
        RunIdSequence::new()
    };

    let command = SimulatorCommand::from(&config.simulator);
    let dispatcher = Dispatcher::with_sequence(command, layout, sequence);
    let first_id = dispatcher.next_run_id();
    let evaluator = SimulatorEvaluator::new(dispatcher, table.clone(), target.clone());

    let mut optimizer = RandomSearch::new(config.seed);
    let options = StudyOptions {
        max_trials: config.max_trials,
        failure_penalty: config.failure_penalty,
    };

    println!("Calibrating {} parameters against {:?}", table.len(), config.target_path);
    println!("Target points: {}", target.len());
    println!("Trials: {} (first run id {})", options.max_trials, first_id);
    println!();

    let result = run_study(&table, &mut optimizer, &evaluator, &options)
        .await
        .context("Calibration loop failed")?;

    let summary = StudySummary::from_result(&result, &table)?;
    write_summary_json(&config.summary_path, &summary)
        .with_context(|| format!("Failed to write summary {:?}", config.summary_path))?;
    info!(path = %config.summary_path.display(), "Wrote study summary");

    for trial in &result.trials {
        let id = trial
            .run_id
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| "-".to_string());
        match trial.score {
            Some(score) => println!("  ✓ {id} error={score:.6} ({:.0}s)", trial.duration_secs),
            None => println!(
                "  ✗ {id} {} ({})",
                trial.status,
                trial.error.as_deref().unwrap_or("no detail")
            ),
        }
    }

    println!();
    println!(
        "Summary: {}/{} trials completed",
        result.completed_count(),
        result.trials.len()
    );
    match &summary.best {
        Some(best) => {
            let id = best.run_id.map(|id| id.to_string()).unwrap_or_default();
            println!("Best: run #{id} error={:.6}", best.score);
            for (name, value) in best.physical.iter() {
                println!("  {name} = {value}");
            }
        }
        None => println!("Best: none (no trial completed)"),
    }
    Ok(())
}

/// Best trial of the summary left by an earlier study, if any.
fn previous_best(path: &Path) -> Result<Option<BestTrial>> {
    if !path.exists() {
        return Ok(None);
    }
    let summary = read_summary_json(path)
        .with_context(|| format!("Failed to read summary {:?}", path))?;
    Ok(summary.best)
}

fn cmd_aggregate(config: &StudyConfig, figures: Option<&Path>) -> Result<()> {
    let table = config.parameter_table()?;
    let target = TargetSeries::load(&config.target_path)
        .with_context(|| format!("Failed to load target {:?}", config.target_path))?;
    let layout = RunLayout::new(&config.output_dir);

    let runs = ArchiveAggregator::new(&layout, &table, &target)
        .aggregate()
        .context("Failed to aggregate archived runs")?;

    print!("{}", render_run_table(&runs));

    write_run_table_csv(&config.export_path, &runs)
        .with_context(|| format!("Failed to write export {:?}", config.export_path))?;
    println!();
    println!("Exported {} run(s) to {:?}", runs.len(), config.export_path);

    if let Some(dir) = figures {
        for row in &runs.rows {
            write_plot_data(dir, &target, row)
                .with_context(|| format!("Failed to write plot data for run {}", row.run_id))?;
        }
        println!("Wrote plot data for {} run(s) to {:?}", runs.len(), dir);
    }

    if let Some(best) = runs.best() {
        println!("Best: run #{} error={:.6}", best.run_id, best.error);
    }
    Ok(())
}

fn cmd_params(config: &StudyConfig) -> Result<()> {
    let table = config.parameter_table()?;
    println!("{:<12} {:>12} {:>12}  transform", "name", "lower", "upper");
    for spec in table.iter() {
        let transform = serde_json::to_value(spec.transform)?;
        println!(
            "{:<12} {:>12} {:>12}  {}",
            spec.name,
            spec.lower,
            spec.upper,
            transform.as_str().unwrap_or_default()
        );
    }
    Ok(())
}

fn parse_values(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid number: {:?}", v.trim()))
        })
        .collect()
}

fn codec_to_physical(table: &ParameterTable, raw: &str) -> Result<ParamVector> {
    let normalized = table.vector_from_values(&parse_values(raw)?)?;
    Ok(table.to_physical(&normalized)?)
}

fn codec_to_normalized(table: &ParameterTable, raw: &str) -> Result<ParamVector> {
    let physical = table.vector_from_values(&parse_values(raw)?)?;
    Ok(table.to_normalized(&physical)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_commands_are_inverse() {
        let table = StudyConfig::default().parameter_table().unwrap();
        let physical = codec_to_physical(&table, "0.5, 0.5, 0.5, 0.5").unwrap();
        assert_eq!(physical.get("k1"), Some(5.5));
        assert!((physical.get("k2").unwrap() - 10f64.powf(10.5)).abs() < 1e-3);

        let raw = physical
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let back = codec_to_normalized(&table, &raw).unwrap();
        for (name, unit) in back.iter() {
            assert!((unit - 0.5).abs() < 1e-9, "{name}: {unit}");
        }
    }

    #[test]
    fn test_codec_rejects_wrong_arity_and_garbage() {
        let table = StudyConfig::default().parameter_table().unwrap();
        assert!(codec_to_physical(&table, "0.1,0.2").is_err());
        let err = codec_to_physical(&table, "0.1,x,0.3,0.4").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid number"));
    }

    #[test]
    fn test_missing_config_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("study.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load study config"));
    }

    #[test]
    fn test_aggregate_writes_export_and_figures() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("data.csv");
        std::fs::write(&target_path, "0,1.0\n1,2.0\n").unwrap();
        let output_dir = dir.path().join("output");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(
            output_dir.join("result-1.txt"),
            "5\t1e10\t0.001\t0.05\n0\t1.0\n1\t2.5\n",
        )
        .unwrap();

        let config = StudyConfig {
            target_path,
            output_dir,
            export_path: dir.path().join("export_dataframe.csv"),
            ..StudyConfig::default()
        };
        let figures = dir.path().join("figs");
        cmd_aggregate(&config, Some(&figures)).unwrap();

        let export = std::fs::read_to_string(&config.export_path).unwrap();
        assert!(export.starts_with("run,k1,k2,dmg,dcl,error,output"));
        assert!(figures.join("fig-1.csv").exists());
    }

    #[tokio::test]
    async fn test_calibrate_with_shell_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("data.csv");
        std::fs::write(&target_path, "0,1.0\n").unwrap();
        let output_dir = dir.path().join("output");

        let mut config = StudyConfig {
            target_path,
            output_dir: output_dir.clone(),
            summary_path: dir.path().join("best.json"),
            max_trials: 3,
            seed: Some(9),
            ..StudyConfig::default()
        };
        config.simulator.program = "sh".to_string();
        config.simulator.args = vec![
            "-c".to_string(),
            format!(
                "printf '%s %s %s %s\\n0 1.5\\n' \"$4\" \"$6\" \"$8\" \"${{10}}\" > '{}/result-$2.txt'",
                output_dir.display()
            ),
            "sim".to_string(),
        ];

        cmd_calibrate(&config, false).await.unwrap();

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.summary_path).unwrap()).unwrap();
        assert_eq!(summary["total_trials"], 3);
        assert_eq!(summary["completed"], 3);
        assert_eq!(summary["best"]["score"], 0.5);

        let best = previous_best(&config.summary_path).unwrap().unwrap();
        assert_eq!(best.score, 0.5);

        // A resumed study continues numbering after run 3.
        cmd_calibrate(&config, true).await.unwrap();
        assert!(output_dir.join("result-6.txt").exists());
    }

    #[test]
    fn test_previous_best_without_summary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(previous_best(&dir.path().join("best.json")).unwrap().is_none());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        let err = previous_best(&corrupt).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read summary"));
    }
}
