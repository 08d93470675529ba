//! JSON result writer for prediction and evaluation outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{ExperimentName, SampleId};

/// Writes prediction and evaluation results to JSON files and names model
/// files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_predict.json`,
/// `{experiment}_evaluate.json`, and `{experiment}_tree.txt`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the experiment name.
    #[must_use]
    pub fn experiment(&self) -> &ExperimentName {
        &self.experiment
    }

    /// Path of the persisted decision tree, `{experiment}_tree.txt`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.artifact_path("tree.txt")
    }

    /// Path of the persisted z-score parameters, `{experiment}_normalization.txt`.
    #[must_use]
    pub fn normalization_path(&self) -> PathBuf {
        self.artifact_path("normalization.txt")
    }

    /// Path of the persisted centroid weights, `{experiment}_weights.txt`.
    #[must_use]
    pub fn weights_path(&self) -> PathBuf {
        self.artifact_path("weights.txt")
    }

    /// Write per-sample predictions to `{experiment}_predict.json`.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_predictions(
        &self,
        sample_ids: &[SampleId],
        predictions: &[usize],
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("predict.json");

        let predictions_map: BTreeMap<&str, usize> = sample_ids
            .iter()
            .zip(predictions)
            .map(|(id, &class)| (id.as_str(), class))
            .collect();

        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            n_samples: predictions_map.len(),
            n_positive: predictions.iter().filter(|&&p| p == 1).count(),
            predictions: predictions_map,
        };

        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Write an evaluation summary to `{experiment}_evaluate.json`.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, evaluation: &Evaluation<'_>) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("evaluate.json");
        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            evaluation,
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "evaluation written");
        Ok(path)
    }

    fn artifact_path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}", self.experiment.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Binary evaluation metrics, passed as primitives so this crate does not
/// depend on the model crates.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation<'a> {
    /// Model that produced the predictions (`"tree"` or `"centroid"`).
    pub model: &'a str,
    /// Number of evaluated samples.
    pub n_samples: usize,
    /// Decision threshold, for score-based models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Positives predicted positive.
    pub true_positives: usize,
    /// Negatives predicted positive.
    pub false_positives: usize,
    /// Negatives predicted negative.
    pub true_negatives: usize,
    /// Positives predicted negative.
    pub false_negatives: usize,
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// TP / (TP + FP).
    pub precision: f64,
    /// TP / (TP + FN).
    pub recall: f64,
    /// TN / (TN + FP).
    pub specificity: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Sample IDs predicted positive, in input order.
    pub flagged: Vec<&'a str>,
}

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_samples: usize,
    n_positive: usize,
    predictions: BTreeMap<&'a str, usize>,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    #[serde(flatten)]
    evaluation: &'a Evaluation<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(dir: &Path) -> ResultWriter {
        ResultWriter::new(dir, ExperimentName::new("exp1".into()).unwrap()).unwrap()
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        writer(&nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn artifact_paths_use_experiment_prefix() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path());
        assert_eq!(w.model_path(), dir.path().join("exp1_tree.txt"));
        assert_eq!(w.normalization_path(), dir.path().join("exp1_normalization.txt"));
        assert_eq!(w.weights_path(), dir.path().join("exp1_weights.txt"));
    }

    #[test]
    fn predictions_json_shape() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path());
        let ids = vec![SampleId::new("b".into()), SampleId::new("a".into())];
        let path = w.write_predictions(&ids, &[1, 0]).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["experiment"], "exp1");
        assert_eq!(v["n_samples"], 2);
        assert_eq!(v["n_positive"], 1);
        assert_eq!(v["predictions"]["b"], 1);
        assert_eq!(v["predictions"]["a"], 0);
    }

    #[test]
    fn evaluation_json_is_flat() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path());
        let evaluation = Evaluation {
            model: "tree",
            n_samples: 4,
            threshold: None,
            true_positives: 1,
            false_positives: 1,
            true_negatives: 1,
            false_negatives: 1,
            accuracy: 0.5,
            precision: 0.5,
            recall: 0.5,
            specificity: 0.5,
            f1: 0.5,
            flagged: vec!["s1", "s2"],
        };
        let path = w.write_evaluation(&evaluation).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["experiment"], "exp1");
        assert_eq!(v["model"], "tree");
        assert!(v.get("threshold").is_none());
        assert_eq!(v["flagged"][1], "s2");
    }
}
