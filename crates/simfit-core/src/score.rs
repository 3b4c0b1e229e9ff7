//! Fit error between a simulated series and the target series.

use crate::error::{Result, SimfitError};

/// Root-mean-square error over matched indices.
///
/// Both series must be non-empty and of equal length.
pub fn rmse(produced: &[f64], target: &[f64]) -> Result<f64> {
    if produced.len() != target.len() {
        return Err(SimfitError::LengthMismatch {
            expected: target.len(),
            actual: produced.len(),
        });
    }
    if produced.is_empty() {
        return Err(SimfitError::EmptySeries);
    }

    let sum_sq: f64 = produced
        .iter()
        .zip(target)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    Ok((sum_sq / produced.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_series_scores_zero() {
        let x = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&x, &x).unwrap(), 0.0);
    }

    #[test]
    fn test_unit_offset_scores_one() {
        let target = [1.0, 2.0, 3.0];
        let produced = [2.0, 3.0, 4.0];
        assert!((rmse(&produced, &target).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric() {
        let a = [0.3, -1.2, 4.0, 2.2];
        let b = [1.0, 0.5, 3.5, -0.7];
        assert_eq!(rmse(&a, &b).unwrap(), rmse(&b, &a).unwrap());
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let err = rmse(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            SimfitError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(rmse(&[], &[]), Err(SimfitError::EmptySeries)));
    }
}
