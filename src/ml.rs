use crate::analysis::Label;
use crate::errors::{ArgusError, ArgusResult};
use crate::features::space::SparseMatrix;
use crate::features::{FeatureKind, Level};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub level: Level,
    pub features: FeatureKind,
    pub n: usize,
    pub trees: u16,
}

/// Thin adapter over the external random forest.
///
/// The two classes are encoded 0/1 and the forest is fit as a seeded
/// regression ensemble, so its prediction is the fraction of trees voting
/// malicious; that vote fraction is the probability the threshold is applied
/// to.
#[derive(Serialize, Deserialize)]
pub struct ForestModel {
    pub meta: ModelMeta,
    forest: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl ForestModel {
    pub fn train(
        matrix: &SparseMatrix,
        labels: &[Label],
        meta: ModelMeta,
    ) -> ArgusResult<Self> {
        if matrix.nrows != labels.len() {
            return Err(ArgusError::Config(format!(
                "{} rows but {} labels",
                matrix.nrows,
                labels.len()
            )));
        }
        let x = DenseMatrix::from_2d_vec(&matrix.to_dense());
        let y: Vec<f64> = labels
            .iter()
            .map(|l| if *l == Label::Malicious { 1.0 } else { 0.0 })
            .collect();
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(meta.trees.into())
            .with_max_depth(50)
            .with_seed(0);
        let forest = RandomForestRegressor::fit(&x, &y, params)
            .map_err(|e| ArgusError::Msg(format!("forest training failed: {e}")))?;
        Ok(Self { meta, forest })
    }

    /// Per-row probability of the malicious class.
    pub fn predict_proba(&self, matrix: &SparseMatrix) -> ArgusResult<Vec<f64>> {
        let x = DenseMatrix::from_2d_vec(&matrix.to_dense());
        self.forest
            .predict(&x)
            .map_err(|e| ArgusError::Msg(format!("forest prediction failed: {e}")))
    }

    pub fn save(&self, path: &Path) -> ArgusResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = fs::File::create(path)
            .map_err(|e| ArgusError::Serialization(format!("{}: {e}", path.display())))?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .map_err(|e| ArgusError::Serialization(format!("{}: {e}", path.display())))?;
        info!("model stored in {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> ArgusResult<Self> {
        let file = fs::File::open(path)
            .map_err(|e| ArgusError::Config(format!("cannot open model {}: {e}", path.display())))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| ArgusError::Config(format!("unreadable model {}: {e}", path.display())))
    }
}

/// Threshold the malicious-class probabilities into labels.
pub fn predict_labels(probas: &[f64], threshold: f64) -> Vec<Label> {
    probas
        .iter()
        .map(|&p| {
            if p >= threshold {
                Label::Malicious
            } else {
                Label::Benign
            }
        })
        .collect()
}

/// One line per file: `path: predicted (truth) proba`.
pub fn print_results(analyses: &[crate::analysis::Analysis], probas: &[f64]) {
    for (analysis, proba) in analyses.iter().zip(probas) {
        println!(
            "{}: {} ({}) proba: {proba:.3}",
            analysis.pdg_path.display(),
            analysis.prediction.unwrap_or(Label::Unknown),
            analysis.label
        );
    }
    println!("> name: labelPredicted (trueLabel) P(malicious)");
}

/// Confusion counts `(tn, fp, fn, tp)`, or `None` without full ground truth.
pub fn score(labels: &[Label], predicted: &[Label]) -> Option<(usize, usize, usize, usize)> {
    if labels.contains(&Label::Unknown) {
        info!("no ground truth given: cannot score the predictions");
        return None;
    }
    let mut tn = 0;
    let mut fp = 0;
    let mut fnn = 0;
    let mut tp = 0;
    for (l, p) in labels.iter().zip(predicted) {
        match (l, p) {
            (Label::Benign, Label::Benign) => tn += 1,
            (Label::Benign, Label::Malicious) => fp += 1,
            (Label::Malicious, Label::Benign) => fnn += 1,
            _ => tp += 1,
        }
    }
    Some((tn, fp, fnn, tp))
}

pub fn print_score(labels: &[Label], predicted: &[Label]) {
    let Some((tn, fp, fnn, tp)) = score(labels, predicted) else {
        return;
    };
    let total = (tn + fp + fnn + tp).max(1);
    println!("Detection: {:.4}", (tp + tn) as f64 / total as f64);
    println!("TP: {tp}, FP: {fp}, FN: {fnn}, TN: {tn}");
    if tp + fnn > 0 && tn + fp > 0 {
        println!(
            "TPR: {:.4}, TNR: {:.4}",
            tp as f64 / (tp + fnn) as f64,
            tn as f64 / (tn + fp) as f64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use crate::features::space::{FeatureDict, features_vector};
    use std::collections::HashMap;

    fn separable_data() -> (SparseMatrix, Vec<Label>) {
        let f_ben = Feature::Ngram(vec![Some(1)]);
        let f_mal = Feature::Ngram(vec![Some(2)]);
        let mut dict = FeatureDict::new();
        dict.insert(f_ben.clone(), 0);
        dict.insert(f_mal.clone(), 1);

        let mut matrix = SparseMatrix::new();
        let mut labels = Vec::new();
        for i in 0..24 {
            let malicious = i % 2 == 1;
            let feature = if malicious { &f_mal } else { &f_ben };
            let counts = HashMap::from([(feature.clone(), 1 + (i as u32 % 3))]);
            let row = features_vector(&counts, 4, &dict);
            matrix.push_row(&row).unwrap();
            labels.push(if malicious {
                Label::Malicious
            } else {
                Label::Benign
            });
        }
        (matrix, labels)
    }

    #[test]
    fn forest_separates_the_classes() {
        let (matrix, labels) = separable_data();
        let meta = ModelMeta {
            level: Level::Ast,
            features: FeatureKind::Ngrams,
            n: 4,
            trees: 32,
        };
        let model = ForestModel::train(&matrix, &labels, meta).unwrap();
        let probas = model.predict_proba(&matrix).unwrap();
        let predicted = predict_labels(&probas, 0.5);
        assert_eq!(predicted, labels);
    }

    #[test]
    fn models_round_trip_through_disk() {
        let (matrix, labels) = separable_data();
        let meta = ModelMeta {
            level: Level::Pdg,
            features: FeatureKind::Ngrams,
            n: 4,
            trees: 16,
        };
        let model = ForestModel::train(&matrix, &labels, meta).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        let loaded = ForestModel::load(&path).unwrap();
        assert_eq!(loaded.meta, meta);
        let probas = loaded.predict_proba(&matrix).unwrap();
        assert_eq!(predict_labels(&probas, 0.5), labels);
    }

    #[test]
    fn threshold_splits_probabilities() {
        let labels = predict_labels(&[0.2, 0.5, 0.9], 0.5);
        assert_eq!(labels, [Label::Benign, Label::Malicious, Label::Malicious]);
    }

    #[test]
    fn score_counts_the_confusion_cells() {
        let truth = [Label::Benign, Label::Benign, Label::Malicious, Label::Malicious];
        let predicted = [Label::Benign, Label::Malicious, Label::Malicious, Label::Benign];
        assert_eq!(score(&truth, &predicted), Some((1, 1, 1, 1)));
        assert_eq!(score(&[Label::Unknown], &[Label::Benign]), None);
    }
}
