//! Export of the aggregated run table and per-run plot data.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::archive::{RunRow, RunTable};
use crate::error::{Result, SimfitError};
use crate::target::TargetSeries;

/// Separator used inside the single `output` column.
pub const SERIES_SEPARATOR: &str = ";";

/// Header row: `run,<param...>,error,output`.
pub fn table_header(table: &RunTable) -> Vec<String> {
    let mut header = vec!["run".to_string()];
    header.extend(table.columns.iter().cloned());
    header.push("error".to_string());
    header.push("output".to_string());
    header
}

fn row_record(table: &RunTable, row: &RunRow) -> Vec<String> {
    let mut record = vec![row.run_id.to_string()];
    for column in &table.columns {
        record.push(
            row.parameters
                .get(column)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        );
    }
    record.push(row.error.to_string());
    record.push(
        row.output
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(SERIES_SEPARATOR),
    );
    record
}

/// Write the table as CSV. The file is replaced atomically.
pub fn write_run_table_csv(path: &Path, table: &RunTable) -> Result<()> {
    let mut tmp = temp_sibling(path)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(table_header(table))?;
        for row in &table.rows {
            writer.write_record(row_record(table, row))?;
        }
        writer.flush()?;
    }
    persist(tmp, path)?;
    tracing::info!(path = %path.display(), rows = table.rows.len(), "exported run table");
    Ok(())
}

/// Render a fixed-width text table for terminal output.
pub fn render_run_table(table: &RunTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>6}", "run"));
    for column in &table.columns {
        out.push_str(&format!(" {:>14}", column));
    }
    out.push_str(&format!(" {:>14} {:>6}\n", "error", "points"));

    for row in &table.rows {
        out.push_str(&format!("{:>6}", row.run_id));
        for column in &table.columns {
            match row.parameters.get(column) {
                Some(v) => out.push_str(&format!(" {:>14.6e}", v)),
                None => out.push_str(&format!(" {:>14}", "-")),
            }
        }
        out.push_str(&format!(" {:>14.6e} {:>6}\n", row.error, row.output.len()));
    }

    if !table.excluded.is_empty() {
        out.push_str(&format!("\nexcluded {} run(s):\n", table.excluded.len()));
        for excluded in &table.excluded {
            out.push_str(&format!(
                "  #{} ({}): {}\n",
                excluded.run_id, excluded.status, excluded.reason
            ));
        }
    }
    out
}

/// Write `fig-{id}.csv` with `time,target,output` columns for one run.
pub fn write_plot_data(dir: &Path, target: &TargetSeries, row: &RunRow) -> Result<PathBuf> {
    if row.output.len() != target.len() {
        return Err(SimfitError::LengthMismatch {
            expected: target.len(),
            actual: row.output.len(),
        });
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("fig-{}.csv", row.run_id));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["time", "target", "output"])?;
    for ((time, expected), produced) in target
        .times()
        .iter()
        .zip(target.values())
        .zip(&row.output)
    {
        writer.write_record([time.to_string(), expected.to_string(), produced.to_string()])?;
    }
    writer.flush()?;
    Ok(path)
}

fn temp_sibling(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn persist(mut tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
