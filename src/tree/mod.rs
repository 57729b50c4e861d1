//! Split search for classification trees.
//!
//! - [`split`]: the split decision returned for a tree node
//! - [`criterion`]: Gini and entropy impurity
//! - [`statistic`]: per-node histograms and best-split search

pub mod criterion;
pub mod split;
pub mod statistic;

pub use criterion::{criterion_for, Entropy, Gini, SplitCriterion};
pub use split::Split;
pub use statistic::{ClassifiedRow, SplitData, SplitStatistic};
