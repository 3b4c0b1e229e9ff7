//! Offline aggregation of every historical run in an output directory.
//!
//! The aggregator is read-only over the directory and never aborts on a
//! single bad run: short, partial or unparseable result files (including
//! files still being written by a live study) are logged and excluded.

use serde::Serialize;

use crate::durations::DurationLog;
use crate::error::Result;
use crate::obs::emit_run_excluded;
use crate::output::{parse_result_file, RunLayout};
use crate::param::{ParamVector, ParameterTable};
use crate::run::{RunRecord, RunStatus};
use crate::score::rmse;
use crate::target::TargetSeries;

/// One retained run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunRow {
    pub run_id: u64,

    /// Physical values as written in the result header.
    pub physical: ParamVector,

    /// Values with each transform undone (search-space units).
    pub parameters: ParamVector,

    pub error: f64,

    pub output: Vec<f64>,

    /// Wall-clock seconds from the duration log, when recorded.
    pub duration_secs: Option<f64>,
}

impl RunRow {
    /// Row for a completed record; `None` when the record carries no error.
    pub fn from_completed(record: RunRecord, parameters: ParamVector) -> Option<Self> {
        let error = record.error?;
        Some(Self {
            run_id: record.run_id,
            physical: record.parameters,
            parameters,
            error,
            output: record.output,
            duration_secs: record.duration_secs,
        })
    }
}

/// A run left out of the table, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExcludedRun {
    pub run_id: u64,
    pub status: RunStatus,
    pub reason: String,
}

/// All retained runs sorted by run id, plus the exclusions.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunTable {
    /// Parameter column names in declaration order.
    pub columns: Vec<String>,
    pub rows: Vec<RunRow>,
    pub excluded: Vec<ExcludedRun>,
}

impl RunTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row with the lowest error. Ties resolve to the earliest run.
    pub fn best(&self) -> Option<&RunRow> {
        self.rows
            .iter()
            .min_by(|a, b| a.error.total_cmp(&b.error).then(a.run_id.cmp(&b.run_id)))
    }

    pub fn excluded_ids(&self) -> Vec<u64> {
        self.excluded.iter().map(|e| e.run_id).collect()
    }
}

/// Rebuilds the run history from result files.
pub struct ArchiveAggregator<'a> {
    layout: &'a RunLayout,
    table: &'a ParameterTable,
    target: &'a TargetSeries,
}

impl<'a> ArchiveAggregator<'a> {
    pub fn new(layout: &'a RunLayout, table: &'a ParameterTable, target: &'a TargetSeries) -> Self {
        Self {
            layout,
            table,
            target,
        }
    }

    /// Scan, parse, filter and score every result file.
    ///
    /// Fails only when the output directory itself cannot be listed.
    pub fn aggregate(&self) -> Result<RunTable> {
        let files = self.layout.scan_result_files()?;
        let durations = match DurationLog::new(self.layout.duration_log_path()).read() {
            Ok(durations) => durations,
            Err(e) => {
                tracing::warn!(error = %e, "duration log unreadable; durations omitted");
                Default::default()
            }
        };

        let mut table = RunTable {
            columns: self.table.names(),
            ..Default::default()
        };

        for (run_id, path) in files {
            let parsed = parse_result_file(&path, self.table, run_id);
            let status = RunStatus::classify(&parsed, self.target.len());

            let output = match parsed {
                Ok(output) if status.is_scoreable() => output,
                Ok(output) => {
                    self.exclude(
                        &mut table,
                        run_id,
                        status,
                        format!(
                            "expected {} data points, found {}",
                            self.target.len(),
                            output.values.len()
                        ),
                    );
                    continue;
                }
                Err(e) => {
                    self.exclude(&mut table, run_id, status, e.to_string());
                    continue;
                }
            };

            let error = match rmse(&output.values, self.target.values()) {
                Ok(error) => error,
                Err(e) => {
                    self.exclude(&mut table, run_id, RunStatus::Incomplete, e.to_string());
                    continue;
                }
            };
            let parameters = match self.table.to_display(&output.parameters) {
                Ok(parameters) => parameters,
                Err(e) => {
                    self.exclude(&mut table, run_id, RunStatus::Incomplete, e.to_string());
                    continue;
                }
            };

            let mut record = RunRecord::dispatched(run_id, output.parameters);
            record.duration_secs = durations.get(&run_id).copied();
            record.complete(output.values, error);
            if let Some(row) = RunRow::from_completed(record, parameters) {
                table.rows.push(row);
            }
        }

        table.rows.sort_by_key(|row| row.run_id);
        tracing::info!(
            retained = table.rows.len(),
            excluded = table.excluded.len(),
            "aggregated run archive"
        );
        Ok(table)
    }

    fn exclude(&self, table: &mut RunTable, run_id: u64, status: RunStatus, reason: String) {
        emit_run_excluded(run_id, status, &reason);
        table.excluded.push(ExcludedRun {
            run_id,
            status,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{ParameterSpec, Transform};
    use tempfile::tempdir;

    fn table() -> ParameterTable {
        ParameterTable::new(vec![
            ParameterSpec::new("k1", 1.0, 10.0).unwrap(),
            ParameterSpec::new("k2", 6.0, 15.0)
                .unwrap()
                .with_transform(Transform::Log10),
        ])
        .unwrap()
    }

    fn target() -> TargetSeries {
        TargetSeries::from_pairs([(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)])
    }

    #[test]
    fn test_rows_sorted_and_displayed_in_search_units() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        std::fs::write(layout.result_path(10), "2\t1e7\n0\t1\n1\t2\n2\t3\n").unwrap();
        std::fs::write(layout.result_path(2), "3\t1e9\n0\t2\n1\t3\n2\t4\n").unwrap();

        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();

        let ids: Vec<u64> = result.rows.iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec![2, 10]);
        assert!((result.rows[0].error - 1.0).abs() < 1e-12);
        assert_eq!(result.rows[1].error, 0.0);
        assert!((result.rows[0].parameters.get("k2").unwrap() - 9.0).abs() < 1e-12);
        assert_eq!(result.rows[0].physical.get("k2"), Some(1e9));
        assert_eq!(result.best().unwrap().run_id, 10);
    }

    #[test]
    fn test_malformed_file_excluded_not_fatal() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        std::fs::write(layout.result_path(1), "2\t1e7\n0\t1\n1\t2\n2\t3\n").unwrap();
        std::fs::write(layout.result_path(2), "2\t1e7\n0\t1\n1\t").unwrap();
        std::fs::write(layout.result_path(3), "").unwrap();

        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.excluded_ids(), vec![2, 3]);
        assert!(result
            .excluded
            .iter()
            .all(|e| e.status == RunStatus::Incomplete));
    }

    #[test]
    fn test_durations_joined_from_log() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        std::fs::write(layout.result_path(1), "2\t1e7\n0\t1\n1\t2\n2\t3\n").unwrap();
        std::fs::write(layout.duration_log_path(), "run=1: 42 seconds\n").unwrap();

        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();
        assert_eq!(result.rows[0].duration_secs, Some(42.0));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();
        assert!(result.is_empty());
        assert!(result.best().is_none());
        assert_eq!(result.columns, vec!["k1", "k2"]);
    }

    #[test]
    fn test_non_finite_samples_excluded() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        std::fs::write(layout.result_path(1), "2\t1e7\n0\t1\n1\tnan\n2\t3\n").unwrap();
        std::fs::write(layout.result_path(2), "2\t1e7\n0\t1\n1\tinf\n2\t3\n").unwrap();
        std::fs::write(layout.result_path(3), "2\t1e7\n0\t1\n1\t2\n2\t3\n").unwrap();

        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].run_id, 3);
        assert_eq!(result.excluded_ids(), vec![1, 2]);
        assert!(result.rows.iter().all(|r| r.error.is_finite()));
    }

    #[test]
    fn test_non_positive_log_scaled_header_excluded() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        std::fs::write(layout.result_path(1), "2\t0\n0\t1\n1\t2\n2\t3\n").unwrap();
        std::fs::write(layout.result_path(2), "2\t-5\n0\t1\n1\t2\n2\t3\n").unwrap();

        let (table_, target_) = (table(), target());
        let result = ArchiveAggregator::new(&layout, &table_, &target_)
            .aggregate()
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.excluded_ids(), vec![1, 2]);
        for excluded in &result.excluded {
            assert_eq!(excluded.status, RunStatus::Incomplete);
            assert!(excluded.reason.contains("k2"), "{}", excluded.reason);
        }
    }
}
