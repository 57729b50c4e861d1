//! Non-fatal build outcomes.
//!
//! Shortfalls never abort a build. They are logged when they happen and
//! collected here so callers can inspect them after the fact.

use crate::cluster::{ChunkKey, NodeId};
use crate::core::types::{ClassIndex, RowCount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition the build absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildWarning {
    /// The whole cluster holds too few rows of a class for the sample fraction.
    Oversampled {
        /// Class index
        class: ClassIndex,
    },
    /// A stratum override named a class that does not exist.
    IgnoredStratum {
        /// Class index as given
        class: i64,
    },
    /// Fewer rows of a class were found than its quota.
    InsufficientData {
        /// Class index
        class: ClassIndex,
        /// Rows requested
        quota: RowCount,
        /// Rows found
        available: RowCount,
    },
    /// A remote chunk could not be fetched and was skipped.
    ChunkUnavailable {
        /// Address of the chunk
        key: ChunkKey,
    },
    /// More features were requested than there are usable columns.
    FeaturesClamped {
        /// Requested count
        requested: usize,
        /// Count used
        used: usize,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::Oversampled { class } => write!(
                f,
                "There is not enough samples of class {}, it will be oversampled!",
                class
            ),
            BuildWarning::IgnoredStratum { class } => {
                write!(f, "Ignoring stratum override for unknown class {}", class)
            }
            BuildWarning::InsufficientData {
                class,
                quota,
                available,
            } => write!(
                f,
                "Class {} has {} rows available for a quota of {}",
                class, available, quota
            ),
            BuildWarning::ChunkUnavailable { key } => write!(f, "Chunk {} is unavailable", key),
            BuildWarning::FeaturesClamped { requested, used } => {
                write!(f, "Limiting features from {} to {}", requested, used)
            }
        }
    }
}

/// Summary of one node's training buffer build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Node that built the buffer
    pub node: Option<NodeId>,
    /// Rows written per class
    pub rows_per_class: Vec<RowCount>,
    /// Rows dropped by the validity filter
    pub rejected_rows: RowCount,
    /// Chunks read from other nodes
    pub remote_chunks: usize,
    /// Trees this node grows
    pub trees: usize,
    /// Absorbed conditions, in the order they occurred
    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    /// Total rows written
    pub fn total_rows(&self) -> RowCount {
        self.rows_per_class.iter().sum()
    }

    /// Chunks that could not be fetched
    pub fn unavailable_chunks(&self) -> Vec<&ChunkKey> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                BuildWarning::ChunkUnavailable { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Records and logs a warning.
    pub fn warn(&mut self, warning: BuildWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_messages() {
        assert_eq!(
            BuildWarning::Oversampled { class: 1 }.to_string(),
            "There is not enough samples of class 1, it will be oversampled!"
        );
        assert_eq!(
            BuildWarning::FeaturesClamped {
                requested: 9,
                used: 4
            }
            .to_string(),
            "Limiting features from 9 to 4"
        );
    }

    #[test]
    fn test_report_collects_unavailable_chunks() {
        let mut report = BuildReport {
            rows_per_class: vec![3, 4],
            ..Default::default()
        };
        report.warn(BuildWarning::ChunkUnavailable {
            key: ChunkKey::new("r", 0),
        });
        report.warn(BuildWarning::Oversampled { class: 0 });
        assert_eq!(report.total_rows(), 7);
        assert_eq!(report.unavailable_chunks(), vec![&ChunkKey::new("r", 0)]);
    }
}
