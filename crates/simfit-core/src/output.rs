//! Run directory layout and result-file parsing.
//!
//! Layout under the output directory:
//! - `result-{id}.txt`: written by the simulator. Line 1 holds the run's
//!   physical parameter values in declaration order; every later line is a
//!   `time<delim>value` pair. Delimiters may be tabs, commas or spaces.
//! - `output-{id}.txt`: simulator stdout/stderr.
//! - `time.txt`: append-only duration log.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, SimfitError};
use crate::param::{ParamVector, ParameterTable};

const DURATION_LOG_NAME: &str = "time.txt";

fn result_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^result-(\d+)\.txt$").expect("valid result file pattern"))
}

/// Deterministic paths for every per-run artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    output_dir: PathBuf,
}

impl RunLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn result_path(&self, run_id: u64) -> PathBuf {
        self.output_dir.join(format!("result-{run_id}.txt"))
    }

    pub fn log_path(&self, run_id: u64) -> PathBuf {
        self.output_dir.join(format!("output-{run_id}.txt"))
    }

    pub fn duration_log_path(&self) -> PathBuf {
        self.output_dir.join(DURATION_LOG_NAME)
    }

    /// Extract the run id from a result file name such as `result-12.txt`.
    pub fn parse_run_id(file_name: &str) -> Option<u64> {
        result_file_pattern()
            .captures(file_name)
            .and_then(|c| c[1].parse().ok())
    }

    /// Every result file in the output directory, sorted by run id.
    ///
    /// A missing output directory yields an empty list.
    pub fn scan_result_files(&self) -> Result<Vec<(u64, PathBuf)>> {
        if !self.output_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(run_id) = Self::parse_run_id(&name.to_string_lossy()) {
                found.push((run_id, entry.path()));
            }
        }
        found.sort_by_key(|(id, _)| *id);
        Ok(found)
    }

    /// First run id not used by any existing result file.
    pub fn next_free_run_id(&self) -> Result<u64> {
        Ok(self
            .scan_result_files()?
            .last()
            .map(|(id, _)| id + 1)
            .unwrap_or(1))
    }
}

/// Parsed contents of one result file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub run_id: u64,
    /// Physical parameter values decoded from the header line.
    pub parameters: ParamVector,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Read and parse the result file for `run_id`.
pub fn read_run_output(layout: &RunLayout, table: &ParameterTable, run_id: u64) -> Result<RunOutput> {
    parse_result_file(&layout.result_path(run_id), table, run_id)
}

/// Parse a result file at an explicit path.
pub fn parse_result_file(path: &Path, table: &ParameterTable, run_id: u64) -> Result<RunOutput> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SimfitError::MissingResultFile {
                run_id,
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let malformed = |line: usize, reason: String| SimfitError::MalformedRecord {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = content.lines().enumerate();
    let header = lines
        .next()
        .map(|(_, l)| l)
        .ok_or_else(|| malformed(1, "missing parameter header".to_string()))?;

    let header_values = split_fields(header)
        .map(|f| parse_number(f).map_err(|r| malformed(1, r)))
        .collect::<Result<Vec<f64>>>()?;
    if header_values.len() != table.len() {
        return Err(malformed(
            1,
            format!(
                "expected {} parameter values in header, found {}",
                table.len(),
                header_values.len()
            ),
        ));
    }
    let parameters = table.vector_from_values(&header_values)?;

    let mut times = Vec::new();
    let mut values = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = split_fields(line).collect();
        if fields.len() != 2 {
            return Err(malformed(
                line_no,
                format!("expected time and value, found {} fields", fields.len()),
            ));
        }
        times.push(parse_number(fields[0]).map_err(|r| malformed(line_no, r))?);
        values.push(parse_number(fields[1]).map_err(|r| malformed(line_no, r))?);
    }

    Ok(RunOutput {
        run_id,
        parameters,
        times,
        values,
    })
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == '\t' || c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
}

fn parse_number(field: &str) -> std::result::Result<f64, String> {
    let value = field
        .parse::<f64>()
        .map_err(|_| format!("{field:?} is not a number"))?;
    if !value.is_finite() {
        return Err(format!("{field:?} is not finite"));
    }
    Ok(value)
}
