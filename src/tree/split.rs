//! Split decisions produced by the split statistic.

use crate::core::types::{BinCode, ClassIndex, ColumnIndex};
use serde::{Deserialize, Serialize};

/// Outcome of a split search at one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Split {
    /// Every row has the same class; the node becomes a leaf.
    Constant {
        /// The single class
        class: ClassIndex,
    },
    /// No column offers a boundary with rows on both sides; the node
    /// becomes a leaf predicting the majority class.
    Impossible {
        /// Majority class, ties broken at random
        class: ClassIndex,
    },
    /// Rows with `code <= split_point` go left.
    Column {
        /// Column split on
        column: ColumnIndex,
        /// Last code of the left side
        split_point: BinCode,
        /// Score of the split, higher is better
        fitness: f64,
    },
    /// Rows with `code == split_point` go left, all others go right.
    Exclusion {
        /// Column split on
        column: ColumnIndex,
        /// The code sent left
        split_point: BinCode,
        /// Score of the split, higher is better
        fitness: f64,
    },
}

impl Split {
    /// Score of the split; leaves score -1.
    pub fn fitness(&self) -> f64 {
        match self {
            Split::Column { fitness, .. } | Split::Exclusion { fitness, .. } => *fitness,
            Split::Constant { .. } | Split::Impossible { .. } => -1.0,
        }
    }

    /// True if this split scores strictly higher than `other`.
    pub fn better_than(&self, other: &Split) -> bool {
        self.fitness() > other.fitness()
    }

    /// True for constant and impossible splits.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Split::Constant { .. } | Split::Impossible { .. })
    }

    /// Class predicted by a leaf.
    pub fn class(&self) -> Option<ClassIndex> {
        match self {
            Split::Constant { class } | Split::Impossible { class } => Some(*class),
            _ => None,
        }
    }

    /// Column of a real split.
    pub fn column(&self) -> Option<ColumnIndex> {
        match self {
            Split::Column { column, .. } | Split::Exclusion { column, .. } => Some(*column),
            _ => None,
        }
    }

    /// Side a row with `code` in the split column goes to. Leaves send
    /// everything left.
    pub fn goes_left(&self, code: BinCode) -> bool {
        match self {
            Split::Column { split_point, .. } => code <= *split_point,
            Split::Exclusion { split_point, .. } => code == *split_point,
            Split::Constant { .. } | Split::Impossible { .. } => true,
        }
    }
}
