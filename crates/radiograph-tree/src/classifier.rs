//! Stateful classifier: hyperparameters plus an optional trained tree.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, instrument};

use crate::error::TreeError;
use crate::serialize::{read_tree, write_tree};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A binary decision tree classifier.
///
/// Created empty; [`train`](Self::train) grows a tree and replaces any
/// previous one wholesale. Instances are not meant to be shared across
/// threads while training; use one instance per thread instead.
#[derive(Debug, Clone, Default)]
pub struct DecisionTreeClassifier {
    config: DecisionTreeConfig,
    tree: Option<DecisionTree>,
}

impl DecisionTreeClassifier {
    /// Create an untrained classifier with the given hyperparameters.
    #[must_use]
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self { config, tree: None }
    }

    /// Return the hyperparameters fixed at construction.
    #[must_use]
    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    /// Return the trained tree, if any.
    #[must_use]
    pub fn tree(&self) -> Option<&DecisionTree> {
        self.tree.as_ref()
    }

    /// Return `true` once a tree has been trained or loaded.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.tree.is_some()
    }

    /// Train on `features`/`labels`, replacing any existing tree.
    ///
    /// On error the previous tree (if any) is kept.
    ///
    /// # Errors
    ///
    /// Any validation error from [`DecisionTreeConfig::fit`].
    pub fn train(&mut self, features: &[Vec<f64>], labels: &[usize]) -> Result<(), TreeError> {
        let tree = self.config.fit(features, labels)?;
        self.tree = Some(tree);
        Ok(())
    }

    /// Predict the class (0 or 1) of one sample.
    ///
    /// # Errors
    ///
    /// [`TreeError::Untrained`] before training, otherwise any error from
    /// [`DecisionTree::predict`].
    pub fn predict(&self, sample: &[f64]) -> Result<usize, TreeError> {
        self.trained()?.predict(sample)
    }

    /// Predict a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// [`TreeError::Untrained`] before training, otherwise the first
    /// prediction error.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, TreeError> {
        self.trained()?.predict_batch(features)
    }

    /// Write the tree in the line-oriented text format.
    ///
    /// An untrained classifier writes a single `NULL` line.
    ///
    /// # Errors
    ///
    /// [`TreeError::Stream`] when the writer fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), TreeError> {
        write_tree(self.tree.as_ref(), out)?;
        Ok(())
    }

    /// Replace the tree with one parsed from `reader`.
    ///
    /// The classifier is only modified when parsing succeeds. A `NULL`
    /// root leaves the classifier untrained.
    ///
    /// # Errors
    ///
    /// [`TreeError::MalformedModel`] or [`TreeError::Stream`].
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<(), TreeError> {
        self.tree = read_tree(reader)?;
        Ok(())
    }

    /// Save the tree to a text file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::WriteModel`] | file creation or write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();
        let write_err = |source| TreeError::WriteModel {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(write_err)?;
        let mut out = BufWriter::new(file);
        write_tree(self.tree.as_ref(), &mut out).map_err(write_err)?;
        out.flush().map_err(write_err)?;

        info!(
            n_nodes = self.tree.as_ref().map_or(0, DecisionTree::n_nodes),
            "model saved"
        );
        Ok(())
    }

    /// Load a tree from a text file, replacing the current one.
    ///
    /// Either the whole file parses and the tree is swapped in, or the
    /// classifier keeps its pre-call state.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ReadModel`] | file open or read failed |
    /// | [`TreeError::MalformedModel`] | content does not follow the grammar |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();
        let read_err = |source| TreeError::ReadModel {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(read_err)?;
        let tree = read_tree(BufReader::new(file)).map_err(|e| match e {
            TreeError::Stream { source } => read_err(source),
            other => other,
        })?;

        info!(
            n_nodes = tree.as_ref().map_or(0, DecisionTree::n_nodes),
            "model loaded"
        );
        self.tree = tree;
        Ok(())
    }

    fn trained(&self) -> Result<&DecisionTree, TreeError> {
        self.tree.as_ref().ok_or(TreeError::Untrained)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn staircase() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![0, 0, 1, 1],
        )
    }

    fn trained() -> DecisionTreeClassifier {
        let (features, labels) = staircase();
        let mut clf =
            DecisionTreeClassifier::new(DecisionTreeConfig::new().with_max_depth(5).with_min_samples(1));
        clf.train(&features, &labels).unwrap();
        clf
    }

    #[test]
    fn defaults_match_documented_hyperparameters() {
        let clf = DecisionTreeClassifier::default();
        assert_eq!(clf.config().max_depth(), 5);
        assert_eq!(clf.config().min_samples(), 2);
        assert!(!clf.is_trained());
    }

    #[test]
    fn predict_before_train_is_untrained_error() {
        let clf = DecisionTreeClassifier::default();
        assert!(matches!(clf.predict(&[1.0]), Err(TreeError::Untrained)));
        assert!(matches!(clf.predict_batch(&[vec![1.0]]), Err(TreeError::Untrained)));
    }

    #[test]
    fn train_on_empty_is_invalid_input() {
        let mut clf = DecisionTreeClassifier::default();
        assert!(matches!(clf.train(&[], &[]), Err(TreeError::EmptyDataset)));
        assert!(!clf.is_trained());
    }

    #[test]
    fn staircase_end_to_end() {
        let clf = trained();
        assert_eq!(clf.predict(&[1.5]).unwrap(), 0);
        assert_eq!(clf.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn retraining_replaces_tree() {
        let mut clf = trained();
        clf.train(&[vec![0.0], vec![1.0]], &[1, 1]).unwrap();
        assert_eq!(clf.tree().unwrap().n_nodes(), 1);
        assert_eq!(clf.predict(&[0.0]).unwrap(), 1);
    }

    #[test]
    fn failed_retrain_keeps_previous_tree() {
        let mut clf = trained();
        assert!(clf.train(&[vec![f64::INFINITY]], &[0]).is_err());
        assert_eq!(clf.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.txt");
        let clf = trained();
        clf.save(&path).unwrap();

        let mut restored = DecisionTreeClassifier::default();
        restored.load(&path).unwrap();
        for x in [-1.0, 0.5, 1.99, 2.0, 7.0] {
            assert_eq!(clf.predict(&[x]).unwrap(), restored.predict(&[x]).unwrap());
        }
    }

    #[test]
    fn untrained_saves_null_and_loads_untrained() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        DecisionTreeClassifier::default().save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "NULL\n");

        let mut clf = trained();
        clf.load(&path).unwrap();
        assert!(!clf.is_trained());
    }

    #[test]
    fn load_missing_file_keeps_state() {
        let mut clf = trained();
        let err = clf.load("/nonexistent/dir/tree.txt").unwrap_err();
        assert!(matches!(err, TreeError::ReadModel { .. }));
        assert_eq!(clf.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn load_malformed_file_keeps_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "NODE -1 0 1.0\nLEAF 0 -1 0\nNULL\nNULL\n").unwrap();
        let mut clf = trained();
        let err = clf.load(&path).unwrap_err();
        assert!(matches!(err, TreeError::MalformedModel { .. }));
        assert!(clf.is_trained());
        assert_eq!(clf.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn save_to_missing_directory_is_write_error() {
        let err = trained().save("/nonexistent/dir/tree.txt").unwrap_err();
        assert!(matches!(err, TreeError::WriteModel { .. }));
    }

    #[test]
    fn writer_reader_round_trip() {
        let clf = trained();
        let mut buf = Vec::new();
        clf.write_to(&mut buf).unwrap();
        let mut restored = DecisionTreeClassifier::default();
        restored.read_from(buf.as_slice()).unwrap();
        assert_eq!(restored.predict(&[0.0]).unwrap(), 0);
        assert_eq!(restored.predict(&[3.0]).unwrap(), 1);
    }
}
