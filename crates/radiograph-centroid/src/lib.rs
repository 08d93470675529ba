//! Z-score normalization, centroid-distance scoring, and decision-threshold
//! sweeps for binary screening.
//!
//! A [`ZScore`] is fitted on training features and reused on test features;
//! a [`CentroidModel`] scores normalized samples; a [`SweepConfig`] picks the
//! score threshold with the best accuracy.

mod centroid;
mod error;
mod normalize;
mod params;
mod sweep;

pub use centroid::CentroidModel;
pub use error::CentroidError;
pub use normalize::ZScore;
pub use sweep::{SweepConfig, SweepResult};
