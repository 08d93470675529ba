//! Binary decision tree classification: train, predict, persist.
//!
//! A CART-style tree grown by exhaustive Gini split search over observed
//! feature values, with depth and minimum-sample stopping, an arena node
//! layout, and a line-oriented pre-order text format.

mod classifier;
mod confusion;
mod error;
mod node;
mod serialize;
mod split;
mod tree;

pub use classifier::DecisionTreeClassifier;
pub use confusion::BinaryConfusion;
pub use error::TreeError;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use split::{SplitMethod, gini, most_common};
pub use tree::{DecisionTree, DecisionTreeConfig};
