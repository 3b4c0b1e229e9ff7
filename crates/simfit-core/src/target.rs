//! Experimental target series loading.

use std::path::Path;

use crate::error::{Result, SimfitError};

/// Ordered `(time, value)` observations used as ground truth for scoring.
///
/// Times are kept for plotting and labelling only; scoring uses `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TargetSeries {
    /// Build a series from in-memory pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (times, values) = pairs.into_iter().unzip();
        Self { times, values }
    }

    /// Read a headerless `time,value` file, one pair per line.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SimfitError::MissingFile {
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut times = Vec::new();
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
            let malformed = |reason: String| SimfitError::MalformedRecord {
                path: path.to_path_buf(),
                line,
                reason,
            };

            if record.len() != 2 {
                return Err(malformed(format!(
                    "expected 2 fields, found {}",
                    record.len()
                )));
            }
            let time = parse_field(&record[0]).map_err(|r| malformed(format!("time: {r}")))?;
            let value = parse_field(&record[1]).map_err(|r| malformed(format!("value: {r}")))?;
            times.push(time);
            values.push(value);
        }

        if values.is_empty() {
            return Err(SimfitError::EmptyTarget {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), points = values.len(), "loaded target series");
        Ok(Self { times, values })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_field(field: &str) -> std::result::Result<f64, String> {
    let value = field
        .parse::<f64>()
        .map_err(|e| format!("{field:?} is not a number ({e})"))?;
    if !value.is_finite() {
        return Err(format!("{field:?} is not finite"));
    }
    Ok(value)
}
