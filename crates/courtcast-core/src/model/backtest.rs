// Rolling back-test: for each of the last N game dates, fit on strictly
// earlier rows and score that day.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::metrics::Evaluation;
use super::{BoostParams, Model, ModelError};
use crate::features::labels::POINTS;
use crate::features::{FeatureMatrix, Frame};

#[derive(Debug, Clone, PartialEq)]
pub struct DayScore {
    pub date: NaiveDate,
    pub training_rows: usize,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backtest {
    pub days: Vec<DayScore>,
}

impl Backtest {
    pub fn average_mae(&self) -> Option<f64> {
        if self.days.is_empty() {
            return None;
        }
        Some(self.days.iter().map(|d| d.evaluation.mae).sum::<f64>() / self.days.len() as f64)
    }
}

/// Back-test `features` against the Points target over the last `days`
/// distinct dates of `frame`, oldest first. Dates with no earlier rows are
/// skipped.
pub fn rolling_backtest(
    frame: &Frame,
    features: &[String],
    params: &BoostParams,
    days: usize,
) -> Result<Backtest, ModelError> {
    let matrix = FeatureMatrix::from_frame(frame, features, Some(POINTS))?;
    let dates = matrix.dates();
    let start = dates.len().saturating_sub(days);

    let mut result = Backtest::default();
    for &day in &dates[start..] {
        let train = matrix.filter_rows(|k| k.date < day);
        if train.is_empty() {
            warn!("back-test {day}: no earlier rows, skipping");
            continue;
        }
        let test = matrix.filter_rows(|k| k.date == day);
        let model = Model::fit(&train, params)?;
        let predicted = model.predict(&test)?;
        let actual = test.target.as_deref().unwrap_or_default();
        let Some(evaluation) = Evaluation::compute(actual, &predicted) else {
            continue;
        };
        info!("back-test {day}: {evaluation}");
        result.days.push(DayScore {
            date: day,
            training_rows: train.len(),
            evaluation,
        });
    }

    match result.average_mae() {
        Some(mae) => info!("back-test average MAE over {} days: {mae:.3}", result.days.len()),
        None => warn!("back-test produced no scored days"),
    }
    Ok(result)
}
