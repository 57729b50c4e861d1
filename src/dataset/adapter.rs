//! The node-local training buffer.
//!
//! Rows are stored row-major as [`BinCode`]s, grouped by class: class `c`
//! owns the slot interval `[start_c, start_c + reserved_c)`, where
//! `reserved_c` is its quota capped by the valid rows available. Slots no
//! row was written to stay empty and are skipped by the row iterators.

use crate::core::types::{BinCode, ClassIndex, ColumnIndex, RowCount};
use crate::dataset::codec::ColumnCodec;
use crate::tree::statistic::{ClassifiedRow, SplitData};
use ndarray::{Array2, ArrayView1};
use std::ops::Range;

/// Training rows of one node, with the codecs that produced them.
#[derive(Debug, Clone)]
pub struct DataAdapter {
    codecs: Vec<ColumnCodec>,
    class_column: ColumnIndex,
    num_classes: usize,
    data: Array2<BinCode>,
    filled: Vec<bool>,
    intervals: Vec<Range<usize>>,
    class_weights: Vec<f64>,
    features: usize,
}

/// Number of columns tried per split: `requested` clamped to the usable
/// columns, or `floor(sqrt(usable))` when not given. At least 1 when any
/// column is usable.
pub fn resolve_features(requested: Option<usize>, usable: usize) -> usize {
    match requested {
        Some(f) => f.min(usable),
        None => ((usable as f64).sqrt().floor() as usize).max(1).min(usable),
    }
}

impl DataAdapter {
    /// Allocates an empty buffer whose class `c` interval holds `slots[c]` rows.
    pub fn allocate(
        codecs: Vec<ColumnCodec>,
        class_column: ColumnIndex,
        slots: &[RowCount],
        class_weights: Vec<f64>,
        features: usize,
    ) -> Self {
        let mut intervals = Vec::with_capacity(slots.len());
        let mut start = 0;
        for &n in slots {
            intervals.push(start..start + n);
            start += n;
        }
        let num_columns = codecs.len();
        DataAdapter {
            codecs,
            class_column,
            num_classes: slots.len(),
            data: Array2::zeros((start, num_columns)),
            filled: vec![false; start],
            intervals,
            class_weights,
            features,
        }
    }

    /// Slot capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.filled.len()
    }

    /// Number of filled slots
    pub fn num_rows(&self) -> usize {
        self.filled.iter().filter(|&&f| f).count()
    }

    /// Codec of `column`
    pub fn codec(&self, column: ColumnIndex) -> &ColumnCodec {
        &self.codecs[column]
    }

    /// Class column index
    pub fn class_column(&self) -> ColumnIndex {
        self.class_column
    }

    /// Slot interval of `class`
    pub fn class_interval(&self, class: ClassIndex) -> Range<usize> {
        self.intervals[class].clone()
    }

    /// Class owning `slot`, by interval.
    pub fn class_of_slot(&self, slot: usize) -> Option<ClassIndex> {
        self.intervals.iter().position(|r| r.contains(&slot))
    }

    /// Filled rows of each class
    pub fn rows_per_class(&self) -> Vec<RowCount> {
        self.intervals
            .iter()
            .map(|r| self.filled[r.clone()].iter().filter(|&&f| f).count())
            .collect()
    }

    /// Per-class weights for the tree grower; uniform when none were configured.
    pub fn class_weight(&self, class: ClassIndex) -> f64 {
        self.class_weights.get(class).copied().unwrap_or(1.0)
    }

    /// Columns that may be split on
    pub fn candidate_columns(&self) -> Vec<ColumnIndex> {
        (0..self.codecs.len()).filter(|&c| self.is_candidate(c)).collect()
    }

    /// Row in `slot`, `None` if the slot is empty.
    pub fn row(&self, slot: usize) -> Option<Row<'_>> {
        if !*self.filled.get(slot)? {
            return None;
        }
        Some(Row {
            slot,
            codes: self.data.row(slot),
            class_column: self.class_column,
        })
    }

    /// All filled rows in slot order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.capacity()).filter_map(move |s| self.row(s))
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Array2<BinCode>, &mut [bool]) {
        (&mut self.data, self.filled.as_mut_slice())
    }
}

impl SplitData for DataAdapter {
    fn num_columns(&self) -> usize {
        self.codecs.len()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn num_bins(&self, column: ColumnIndex) -> usize {
        self.codecs[column].num_bins()
    }

    fn is_candidate(&self, column: ColumnIndex) -> bool {
        column != self.class_column && !self.codecs[column].is_ignored()
    }

    fn features(&self) -> usize {
        self.features
    }
}

/// A filled row of the buffer.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    slot: usize,
    codes: ArrayView1<'a, BinCode>,
    class_column: ColumnIndex,
}

impl Row<'_> {
    /// Slot the row occupies
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl ClassifiedRow for Row<'_> {
    fn code(&self, column: ColumnIndex) -> BinCode {
        self.codes[column]
    }

    fn class(&self) -> ClassIndex {
        self.codes[self.class_column] as ClassIndex
    }
}
