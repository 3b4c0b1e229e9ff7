//! Append-only log of simulator wall-clock durations.
//!
//! One human-readable line per run: `run=12: 431 seconds`. The file is
//! opened in append mode for every write and never truncated, so it
//! survives restarts of the calibration loop.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DurationLog {
    path: PathBuf,
}

impl DurationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `run={id}: {secs} seconds` line.
    pub fn append(&self, run_id: u64, elapsed: Duration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "run={}: {:.0} seconds", run_id, elapsed.as_secs_f64())?;
        Ok(())
    }

    /// Read every recorded duration. Unparseable lines are skipped; a
    /// missing log yields an empty map. Later lines win for repeated ids.
    pub fn read(&self) -> Result<BTreeMap<u64, f64>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut durations = BTreeMap::new();
        for line in content.lines() {
            match parse_line(line) {
                Some((run_id, secs)) => {
                    durations.insert(run_id, secs);
                }
                None if line.trim().is_empty() => {}
                None => tracing::debug!(line = %line, "skipping unparseable duration line"),
            }
        }
        Ok(durations)
    }
}

fn parse_line(line: &str) -> Option<(u64, f64)> {
    let rest = line.trim().strip_prefix("run=")?;
    let (id, secs) = rest.split_once(':')?;
    let secs = secs.trim().strip_suffix("seconds")?.trim();
    Some((id.trim().parse().ok()?, secs.parse().ok()?))
}
