// Gradient-boosted regression trees for player points.
//
// Squared loss: gradient = prediction - target, hessian = 1. The ensemble
// starts from the target mean and adds one shrunken tree per round. The
// artifact is JSON and carries its feature names so a matrix with a
// different column set is refused at predict time.

pub mod backtest;
pub mod metrics;
pub mod tree;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::features::FeatureMatrix;
use crate::tables::FrameError;
use tree::{Presorted, Tree};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("feature mismatch: model has {expected} features, matrix has {got} ({detail})")]
    FeatureMismatch {
        expected: usize,
        got: usize,
        detail: String,
    },

    #[error("feature matrix has no target column")]
    MissingTarget,

    #[error("feature matrix is ragged: {detail}")]
    RaggedMatrix { detail: String },

    #[error("no rows to train on")]
    EmptyTrainingSet,

    #[error("target at row {row} is not finite")]
    NonFiniteTarget { row: usize },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to access model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to (de)serialize model artifact {path}: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("model artifact {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 3,
            learning_rate: 0.1,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    features: Vec<String>,
    params: BoostParams,
    base_score: f64,
    trees: Vec<Tree>,
}

impl Model {
    /// Fit an ensemble on `matrix`, which must carry a finite target.
    pub fn fit(matrix: &FeatureMatrix, params: &BoostParams) -> Result<Self, ModelError> {
        let target = matrix.target.as_ref().ok_or(ModelError::MissingTarget)?;
        if matrix.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        check_shape(matrix)?;
        if let Some(row) = target.iter().position(|t| !t.is_finite()) {
            return Err(ModelError::NonFiniteTarget { row });
        }

        let n = target.len();
        let base_score = target.iter().sum::<f64>() / n as f64;
        let presorted = Presorted::new(&matrix.values, matrix.columns.len());
        let hess = vec![1.0; n];
        let mut preds = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let grad: Vec<f64> = preds.iter().zip(target).map(|(p, y)| p - y).collect();
            let tree = Tree::grow(&matrix.values, &presorted, &grad, &hess, params);
            for (p, row) in preds.iter_mut().zip(&matrix.values) {
                *p += tree.predict_row(row);
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                let mse = preds
                    .iter()
                    .zip(target)
                    .map(|(p, y)| (p - y).powi(2))
                    .sum::<f64>()
                    / n as f64;
                debug!("round {}: train rmse {:.4}", round + 1, mse.sqrt());
            }
        }

        info!(
            "fitted {} trees on {} rows x {} features",
            trees.len(),
            n,
            matrix.columns.len()
        );
        Ok(Self {
            features: matrix.columns.clone(),
            params: params.clone(),
            base_score,
            trees,
        })
    }

    /// Predict one value per matrix row. The matrix columns must equal the
    /// training columns, in the same order.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_features(&matrix.columns)?;
        check_shape(matrix)?;
        Ok(matrix
            .values
            .iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    fn check_features(&self, columns: &[String]) -> Result<(), ModelError> {
        if columns == self.features.as_slice() {
            return Ok(());
        }
        let detail = match self
            .features
            .iter()
            .zip(columns)
            .position(|(a, b)| a != b)
        {
            Some(i) => format!(
                "column {i} is {:?}, model expects {:?}",
                columns[i], self.features[i]
            ),
            None => "column counts differ".to_string(),
        };
        Err(ModelError::FeatureMismatch {
            expected: self.features.len(),
            got: columns.len(),
            detail,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total split gain per feature, highest first. Features never split on
    /// are listed with zero gain.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut gain = vec![0.0; self.features.len()];
        for tree in &self.trees {
            for (feature, g) in tree.split_gains() {
                gain[feature] += g;
            }
        }
        let mut ranked: Vec<(String, f64)> = self.features.iter().cloned().zip(gain).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ModelError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved model artifact to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Model = serde_json::from_str(&json).map_err(|source| ModelError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        for (i, tree) in model.trees.iter().enumerate() {
            tree.check(model.features.len())
                .map_err(|message| ModelError::Corrupt {
                    path: path.to_path_buf(),
                    message: format!("tree {i}: {message}"),
                })?;
        }
        debug!(
            "loaded model with {} trees over {} features",
            model.trees.len(),
            model.features.len()
        );
        Ok(model)
    }
}

/// Every row as wide as the column list, target (if any) one per row.
fn check_shape(matrix: &FeatureMatrix) -> Result<(), ModelError> {
    let width = matrix.columns.len();
    if let Some(row) = matrix.values.iter().position(|r| r.len() != width) {
        return Err(ModelError::RaggedMatrix {
            detail: format!(
                "row {row} has {} values for {width} columns",
                matrix.values[row].len()
            ),
        });
    }
    match &matrix.target {
        Some(target) if target.len() != matrix.values.len() => Err(ModelError::RaggedMatrix {
            detail: format!("{} targets for {} rows", target.len(), matrix.values.len()),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PlayerKey;
    use chrono::NaiveDate;

    fn matrix(columns: &[&str], values: Vec<Vec<f64>>, target: Option<Vec<f64>>) -> FeatureMatrix {
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        FeatureMatrix {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: (0..values.len())
                .map(|i| PlayerKey::new(date, "BOS", format!("P{i}")))
                .collect(),
            values,
            target,
        }
    }

    fn step_data() -> FeatureMatrix {
        let values: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 7.0]).collect();
        let target = (0..20).map(|i| if i >= 10 { 30.0 } else { 10.0 }).collect();
        matrix(&["MIN", "AGE"], values, Some(target))
    }

    fn quick() -> BoostParams {
        BoostParams {
            n_estimators: 60,
            max_depth: 2,
            learning_rate: 0.3,
            ..BoostParams::default()
        }
    }

    #[test]
    fn fit_recovers_step_function() {
        let model = Model::fit(&step_data(), &quick()).unwrap();
        let unseen = matrix(&["MIN", "AGE"], vec![vec![2.0, 7.0], vec![15.0, 7.0]], None);
        let preds = model.predict(&unseen).unwrap();
        assert!((preds[0] - 10.0).abs() < 0.5, "got {}", preds[0]);
        assert!((preds[1] - 30.0).abs() < 0.5, "got {}", preds[1]);
    }

    #[test]
    fn importance_ranks_informative_feature_first() {
        let model = Model::fit(&step_data(), &quick()).unwrap();
        let ranked = model.feature_importance();
        assert_eq!(ranked[0].0, "MIN");
        assert!(ranked[0].1 > 0.0);
        assert_eq!(ranked[1], ("AGE".to_string(), 0.0));
    }

    #[test]
    fn reordered_columns_are_refused() {
        let model = Model::fit(&step_data(), &quick()).unwrap();
        let swapped = matrix(&["AGE", "MIN"], vec![vec![7.0, 2.0]], None);
        match model.predict(&swapped).unwrap_err() {
            ModelError::FeatureMismatch { expected, got, .. } => {
                assert_eq!((expected, got), (2, 2));
            }
            other => panic!("expected FeatureMismatch, got: {other}"),
        }
        let short = matrix(&["MIN"], vec![vec![2.0]], None);
        assert!(matches!(
            model.predict(&short),
            Err(ModelError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn fit_requires_target_and_rows() {
        let no_target = matrix(&["MIN"], vec![vec![1.0]], None);
        assert!(matches!(
            Model::fit(&no_target, &quick()),
            Err(ModelError::MissingTarget)
        ));
        let empty = matrix(&["MIN"], vec![], Some(vec![]));
        assert!(matches!(
            Model::fit(&empty, &quick()),
            Err(ModelError::EmptyTrainingSet)
        ));
        let nan = matrix(&["MIN"], vec![vec![1.0]], Some(vec![f64::NAN]));
        assert!(matches!(
            Model::fit(&nan, &quick()),
            Err(ModelError::NonFiniteTarget { row: 0 })
        ));
    }

    #[test]
    fn ragged_matrices_are_refused() {
        let short_target = matrix(&["MIN"], vec![vec![1.0], vec![2.0]], Some(vec![10.0]));
        assert!(matches!(
            Model::fit(&short_target, &quick()),
            Err(ModelError::RaggedMatrix { .. })
        ));
        let narrow_row = matrix(
            &["MIN", "AGE"],
            vec![vec![1.0, 7.0], vec![2.0]],
            Some(vec![10.0, 12.0]),
        );
        assert!(matches!(
            Model::fit(&narrow_row, &quick()),
            Err(ModelError::RaggedMatrix { .. })
        ));

        let model = Model::fit(&step_data(), &quick()).unwrap();
        let narrow = matrix(&["MIN", "AGE"], vec![vec![2.0]], None);
        match model.predict(&narrow).unwrap_err() {
            ModelError::RaggedMatrix { detail } => assert!(detail.contains("row 0")),
            other => panic!("expected RaggedMatrix, got: {other}"),
        }
    }

    #[test]
    fn artifact_round_trip_predicts_identically() {
        let data = step_data();
        let model = Model::fit(&data, &quick()).unwrap();
        let dir = std::env::temp_dir().join(format!("courtcast_model_{}", std::process::id()));
        let path = dir.join("model.json");

        model.save(&path).unwrap();
        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded.features(), model.features());
        assert_eq!(loaded.n_trees(), model.n_trees());
        for (a, b) in loaded
            .predict(&data)
            .unwrap()
            .iter()
            .zip(model.predict(&data).unwrap())
        {
            assert!((a - b).abs() < 1e-9);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_reports_missing_artifact() {
        let path = std::env::temp_dir().join("courtcast_model_does_not_exist.json");
        assert!(matches!(Model::load(&path), Err(ModelError::Io { .. })));
    }
}
