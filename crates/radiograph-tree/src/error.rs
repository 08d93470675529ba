use std::path::PathBuf;

/// Errors from decision tree training, prediction, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when the training dataset (or a label list) has zero samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the feature matrix and label list differ in length.
    #[error("{n_features_rows} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows supplied.
        n_features_rows: usize,
        /// Number of labels supplied.
        n_labels: usize,
    },

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a label is neither 0 nor 1.
    #[error("label {label} at sample {sample_index} is not binary (expected 0 or 1)")]
    InvalidLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The label that was found.
        label: usize,
    },

    /// Returned when predicting with a classifier that holds no tree.
    #[error("classifier has not been trained")]
    Untrained,

    /// Returned when a prediction input is too short for the tree's splits.
    #[error("prediction input has {got} features, expected at least {expected}")]
    PredictionFeatureMismatch {
        /// The number of features the tree reads.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when traversal refers to a node the arena does not hold.
    #[error("node {node} is out of bounds for a tree of {n_nodes} nodes")]
    NodeOutOfBounds {
        /// Arena index that was requested.
        node: usize,
        /// Number of nodes in the arena.
        n_nodes: usize,
    },

    /// Returned when traversal reaches a split whose child was persisted as `NULL`.
    #[error("split node {node} has no {side} child")]
    MissingChild {
        /// Arena index of the split node.
        node: usize,
        /// Which child is absent (`"left"` or `"right"`).
        side: &'static str,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a persisted model stream cannot be written or read.
    #[error("model stream I/O failed")]
    Stream {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Returned when the persisted tree text does not follow the grammar.
    #[error("malformed model at line {line}: {reason}")]
    MalformedModel {
        /// One-based line number of the offending token (0 at end of input).
        line: usize,
        /// Human-readable description of the problem.
        reason: String,
    },
}
