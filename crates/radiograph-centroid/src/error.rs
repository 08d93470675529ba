use std::path::PathBuf;

/// Errors from normalization, centroid scoring, and threshold sweeps.
#[derive(Debug, thiserror::Error)]
pub enum CentroidError {
    /// Returned when the dataset has zero samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when the dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

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

    /// Returned when feature rows and labels (or scores and labels) differ in length.
    #[error("{n_samples} samples but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of samples or scores supplied.
        n_samples: usize,
        /// Number of labels supplied.
        n_labels: usize,
    },

    /// Returned when a value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when one of the two classes has no training samples.
    #[error("class {class} has no samples, cannot compute its centroid")]
    MissingClass {
        /// The class (0 or 1) with no samples.
        class: usize,
    },

    /// Returned when the threshold range or step cannot be swept.
    #[error("invalid threshold sweep: start {start}, end {end}, step {step}")]
    InvalidSweep {
        /// First threshold.
        start: f64,
        /// Last threshold.
        end: f64,
        /// Increment between thresholds.
        step: f64,
    },

    /// Returned when a parameter file cannot be written.
    #[error("failed to write parameters to {path}")]
    WriteParams {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a parameter file cannot be read.
    #[error("failed to read parameters from {path}")]
    ReadParams {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a parameter file does not have the expected layout.
    #[error("malformed parameter file {path}: {reason}")]
    MalformedParams {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable description of the problem.
        reason: String,
    },
}
