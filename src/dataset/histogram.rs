//! Per-chunk class histograms.
//!
//! Each node counts the classes of its own chunks in parallel, one task per
//! chunk writing one row of a pre-sized `(chunks × classes)` matrix. Node
//! results are merged into a dataset-wide matrix ordered by chunk address,
//! so the merged counts never depend on the order nodes reply in.

use crate::cluster::{ChunkKey, KeyValueStore};
use crate::core::error::{DrfError, Result};
use crate::core::types::{ColumnIndex, RowCount};
use crate::core::utils::threading::TaskBatch;
use crate::dataset::descriptor::DatasetDescriptor;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Class counts of a set of chunks, one matrix row per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHistograms {
    keys: Vec<ChunkKey>,
    counts: Array2<RowCount>,
}

impl ChunkHistograms {
    /// Histograms with all counts zero.
    pub fn zeros(keys: Vec<ChunkKey>, num_classes: usize) -> Self {
        let counts = Array2::zeros((keys.len(), num_classes));
        ChunkHistograms { keys, counts }
    }

    /// Number of chunks covered
    pub fn num_chunks(&self) -> usize {
        self.keys.len()
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.counts.ncols()
    }

    /// Chunk addresses in row order
    pub fn keys(&self) -> &[ChunkKey] {
        &self.keys
    }

    /// The `(chunks × classes)` count matrix
    pub fn counts(&self) -> &Array2<RowCount> {
        &self.counts
    }

    /// Class counts of one chunk, `None` if the chunk is not covered.
    pub fn chunk_counts(&self, key: &ChunkKey) -> Option<Vec<RowCount>> {
        let i = self.keys.iter().position(|k| k == key)?;
        Some(self.counts.row(i).to_vec())
    }

    /// Per-class totals over all covered chunks.
    pub fn totals(&self) -> Vec<RowCount> {
        if self.counts.nrows() == 0 {
            return vec![0; self.num_classes()];
        }
        let sums: Array1<RowCount> = self.counts.sum_axis(Axis(0));
        sums.to_vec()
    }

    /// Rows per `(chunk, class)` pair with a non-zero count.
    pub fn nonzero(&self) -> impl Iterator<Item = (&ChunkKey, usize, RowCount)> + '_ {
        self.counts
            .indexed_iter()
            .filter(|(_, &n)| n > 0)
            .map(move |((row, class), &n)| (&self.keys[row], class, n))
    }

    /// Combines histograms of disjoint chunk sets into one, ordered by
    /// chunk address. A chunk reported twice keeps its first occurrence.
    pub fn merge(parts: Vec<ChunkHistograms>) -> Result<Self> {
        let num_classes = parts.first().map(|p| p.num_classes()).unwrap_or(0);
        let mut rows: Vec<(ChunkKey, Vec<RowCount>)> = Vec::new();
        for part in parts {
            if part.num_classes() != num_classes {
                return Err(DrfError::dimension_mismatch(
                    format!("{} classes", num_classes),
                    format!("{} classes", part.num_classes()),
                ));
            }
            for (key, row) in part.keys.into_iter().zip(part.counts.outer_iter()) {
                rows.push((key, row.to_vec()));
            }
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.dedup_by(|a, b| a.0 == b.0);

        let mut merged = ChunkHistograms::zeros(rows.iter().map(|r| r.0.clone()).collect(), num_classes);
        for (mut dst, (_, src)) in merged.counts.outer_iter_mut().zip(rows) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s;
            }
        }
        Ok(merged)
    }

    /// Histograms of the chunks for which `keep` returns true, in the same order.
    pub fn select<F>(&self, mut keep: F) -> ChunkHistograms
    where
        F: FnMut(&ChunkKey) -> bool,
    {
        let rows: Vec<usize> = (0..self.keys.len()).filter(|&i| keep(&self.keys[i])).collect();
        let mut selected = ChunkHistograms::zeros(
            rows.iter().map(|&i| self.keys[i].clone()).collect(),
            self.num_classes(),
        );
        for (mut dst, &i) in selected.counts.outer_iter_mut().zip(&rows) {
            dst.assign(&self.counts.row(i));
        }
        selected
    }
}

/// Counts classes of the chunks a node is home to.
#[derive(Debug, Clone)]
pub struct HistogramBuilder<'a> {
    descriptor: &'a DatasetDescriptor,
    class_column: ColumnIndex,
    num_classes: usize,
}

impl<'a> HistogramBuilder<'a> {
    /// Checks the class column and prepares a builder.
    ///
    /// Fails with [`DrfError::InvalidData`] if the class column is real
    /// valued or has fewer than 2 or more than 65534 classes.
    pub fn new(descriptor: &'a DatasetDescriptor, class_column: ColumnIndex) -> Result<Self> {
        let num_classes = descriptor.num_classes(class_column)?;
        Ok(HistogramBuilder {
            descriptor,
            class_column,
            num_classes,
        })
    }

    /// Number of classes of the class column
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Class counts of one chunk payload. Rows with a missing or
    /// out-of-range class are not counted.
    pub fn count_chunk(&self, payload: &[u8]) -> Vec<RowCount> {
        let mut counts = vec![0; self.num_classes];
        self.count_into(payload, counts.iter_mut());
        counts
    }

    fn count_into<'b, I>(&self, payload: &[u8], counts: I)
    where
        I: Iterator<Item = &'b mut RowCount>,
    {
        let mut counts: Vec<&mut RowCount> = counts.collect();
        for r in 0..self.descriptor.rows_in(payload) {
            let row = self.descriptor.row(payload, r);
            if let Some(class) = self.descriptor.class_of(row, self.class_column, self.num_classes) {
                *counts[class] += 1;
            }
        }
    }

    /// Histograms of `keys`, one parallel task per chunk. Every key must be
    /// readable from `store`.
    pub fn build_local(
        &self,
        store: &dyn KeyValueStore,
        keys: Vec<ChunkKey>,
        batch: &TaskBatch,
    ) -> Result<ChunkHistograms> {
        let mut hist = ChunkHistograms::zeros(keys, self.num_classes);
        let ChunkHistograms { keys, counts } = &mut hist;
        batch.install(|| {
            counts
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(keys.par_iter())
                .try_for_each(|(mut row, key)| -> Result<()> {
                    let payload = store
                        .get(key)
                        .ok_or_else(|| DrfError::chunk_not_found(key.to_string()))?;
                    self.count_into(&payload, row.iter_mut());
                    Ok(())
                })
        })?;
        log::debug!(
            "counted classes of {} chunks of {}",
            hist.num_chunks(),
            self.descriptor.key
        );
        Ok(hist)
    }
}
