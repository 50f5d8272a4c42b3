// Regression metrics for points predictions.

use std::fmt;

use serde::Serialize;

/// Error summary of one set of predictions against ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl Evaluation {
    /// `None` when there is nothing to score. Pairs beyond the shorter
    /// slice are ignored.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let count = actual.len().min(predicted.len());
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let pairs = || actual.iter().zip(predicted).take(count);

        let mae = pairs().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
        let ss_res = pairs().map(|(a, p)| (a - p).powi(2)).sum::<f64>();
        let mean = pairs().map(|(a, _)| a).sum::<f64>() / n;
        let ss_tot = pairs().map(|(a, _)| (a - mean).powi(2)).sum::<f64>();

        // Constant ground truth: perfect fit scores 1, anything else 0.
        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        Some(Self {
            count,
            mae,
            rmse: (ss_res / n).sqrt(),
            r2,
        })
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE {:.3}, RMSE {:.3}, R2 {:.3} (n={})",
            self.mae, self.rmse, self.r2, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let e = Evaluation::compute(&[10.0, 20.0, 30.0], &[12.0, 18.0, 30.0]).unwrap();
        assert_eq!(e.count, 3);
        assert!((e.mae - 4.0 / 3.0).abs() < 1e-12);
        assert!((e.rmse - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((e.r2 - (1.0 - 8.0 / 200.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_input_has_no_score() {
        assert_eq!(Evaluation::compute(&[], &[]), None);
    }

    #[test]
    fn constant_truth() {
        assert_eq!(Evaluation::compute(&[5.0, 5.0], &[5.0, 5.0]).unwrap().r2, 1.0);
        assert_eq!(Evaluation::compute(&[5.0, 5.0], &[4.0, 6.0]).unwrap().r2, 0.0);
    }

    #[test]
    fn display_is_compact() {
        let e = Evaluation::compute(&[1.0, 3.0], &[1.0, 3.0]).unwrap();
        assert_eq!(e.to_string(), "MAE 0.000, RMSE 0.000, R2 1.000 (n=2)");
    }
}
