// Feature matrix handed to the model: the configured columns, in order,
// plus an optional target.

use chrono::NaiveDate;

use super::frame::Frame;
use crate::tables::{FrameError, PlayerKey};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    /// Row identities, parallel to `values`.
    pub rows: Vec<PlayerKey>,
    pub values: Vec<Vec<f64>>,
    pub target: Option<Vec<f64>>,
}

impl FeatureMatrix {
    /// Select `features` (in that order) and optionally `target` from an
    /// assembled frame.
    ///
    /// Fails with `EmptyFrame` when the frame has no rows and with
    /// `MissingColumn` when a feature or the target is absent, so a bad
    /// frame never reaches the model.
    pub fn from_frame(
        frame: &Frame,
        features: &[String],
        target: Option<&str>,
    ) -> Result<Self, FrameError> {
        if frame.is_empty() {
            return Err(FrameError::EmptyFrame {
                frame: frame.name().to_string(),
            });
        }
        let idx = features
            .iter()
            .map(|f| frame.require_column(f))
            .collect::<Result<Vec<_>, _>>()?;
        let target_idx = target.map(|t| frame.require_column(t)).transpose()?;

        let rows = frame.rows().iter().map(|r| r.key.clone()).collect();
        let values = frame
            .rows()
            .iter()
            .map(|r| idx.iter().map(|&i| r.values[i]).collect())
            .collect();
        let target = target_idx.map(|t| frame.rows().iter().map(|r| r.values[t]).collect());

        Ok(Self {
            columns: features.to_vec(),
            rows,
            values,
            target,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sub-matrix of the rows for which `keep` is true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&PlayerKey) -> bool) -> Self {
        let picked: Vec<usize> = (0..self.rows.len()).filter(|&i| keep(&self.rows[i])).collect();
        Self {
            columns: self.columns.clone(),
            rows: picked.iter().map(|&i| self.rows[i].clone()).collect(),
            values: picked.iter().map(|&i| self.values[i].clone()).collect(),
            target: self
                .target
                .as_ref()
                .map(|t| picked.iter().map(|&i| t[i]).collect()),
        }
    }

    /// Distinct row dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().map(|k| k.date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}
