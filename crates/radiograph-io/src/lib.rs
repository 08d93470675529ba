//! Feature CSV reading, validation, and JSON result writing for the
//! radiograph pipeline.

mod domain;
mod error;
mod feature_reader;
mod writer;

pub use domain::{ExperimentName, FeatureDataset, SampleId};
pub use error::IoError;
pub use feature_reader::FeatureReader;
pub use writer::{Evaluation, ResultWriter};
