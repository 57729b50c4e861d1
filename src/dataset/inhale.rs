//! Materialization of the node-local training buffer.
//!
//! One task per selected chunk. The first pass decodes every chunk and
//! applies the row filter. Each task is then given a reservation per class:
//! the valid rows of that class in its chunk, capped by what the class
//! quota has left after the tasks submitted before it. Rejected rows never
//! take quota. The reservations become disjoint sub-ranges of the class
//! intervals, so tasks write the buffer without locks.
//!
//! Binned columns need their bin bounds before any code can be written.
//! Bounds are computed per column from the reserved rows, then the second
//! pass writes their codes.

use crate::cluster::{ChunkBytes, ChunkKey, KeyValueStore};
use crate::config::ForestConfig;
use crate::core::error::{DrfError, Result};
use crate::core::types::{BinCode, ClassIndex, ColumnIndex, RowCount};
use crate::core::utils::threading::TaskBatch;
use crate::dataset::adapter::{resolve_features, DataAdapter};
use crate::dataset::codec::ColumnCodec;
use crate::dataset::descriptor::DatasetDescriptor;
use crate::dataset::histogram::ChunkHistograms;
use crate::dataset::minority::ChunkSelection;
use crate::dataset::report::{BuildReport, BuildWarning};
use crate::dataset::stratify::StratificationPlan;
use ndarray::{ArrayViewMut2, Axis};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One chunk read by the inhale passes.
#[derive(Debug)]
struct ChunkTask {
    key: ChunkKey,
    /// Prefetched payload of a remote chunk
    payload: Option<ChunkBytes>,
    /// Rows per class the chunk holds; zero for classes the task does not take
    class_rows: Vec<RowCount>,
}

/// Result of the first pass over one chunk.
#[derive(Debug)]
struct ChunkScan {
    payload: ChunkBytes,
    /// `(row in chunk, class)` of every accepted row, in chunk order
    accepted: Vec<(usize, ClassIndex)>,
    /// Accepted rows per class
    valid: Vec<RowCount>,
    rejected: RowCount,
}

/// The part of the buffer one task writes for one class.
struct Slot<'a> {
    class: ClassIndex,
    rows: ArrayViewMut2<'a, BinCode>,
    filled: &'a mut [bool],
}

/// Builds a node's [`DataAdapter`] from its chunks and the chunks selected
/// for its under-represented classes.
pub struct TrainingBufferBuilder<'a> {
    descriptor: &'a DatasetDescriptor,
    config: &'a ForestConfig,
    store: &'a dyn KeyValueStore,
    batch: &'a TaskBatch,
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for TrainingBufferBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingBufferBuilder")
            .field("dataset", &self.descriptor.key)
            .field("class_column", &self.config.class_column)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl<'a> TrainingBufferBuilder<'a> {
    /// Creates a builder reading chunks from `store`.
    pub fn new(
        descriptor: &'a DatasetDescriptor,
        config: &'a ForestConfig,
        store: &'a dyn KeyValueStore,
        batch: &'a TaskBatch,
    ) -> Self {
        TrainingBufferBuilder {
            descriptor,
            config,
            store,
            batch,
            cancel: None,
        }
    }

    /// Abandons the build at the next barrier once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Acquire) => Err(DrfError::threading(format!(
                "buffer build abandoned before {}",
                stage
            ))),
            _ => Ok(()),
        }
    }

    /// Builds the buffer.
    ///
    /// `local` holds the class counts of the node's own chunks, which are
    /// read for every class. The remote chunks of `minority` are read only
    /// for the classes they were selected for. Class `c` receives at most
    /// `plan.quotas[c]` rows, taken from local chunks first.
    pub fn build(
        &self,
        local: &ChunkHistograms,
        minority: &[ChunkSelection],
        plan: &StratificationPlan,
    ) -> Result<(DataAdapter, BuildReport)> {
        let num_classes = self.descriptor.num_classes(self.config.class_column)?;
        if plan.quotas.len() != num_classes {
            return Err(DrfError::dimension_mismatch(
                format!("{} quotas", num_classes),
                format!("{} quotas", plan.quotas.len()),
            ));
        }
        let mut report = BuildReport::default();
        for selection in minority {
            for key in &selection.unavailable {
                report.warn(BuildWarning::ChunkUnavailable { key: key.clone() });
            }
        }

        let (mut codecs, binned) = self.plan_codecs(num_classes)?;
        let usable = (0..codecs.len())
            .filter(|&c| c != self.config.class_column && !codecs[c].is_ignored())
            .count();
        if usable == 0 {
            return Err(DrfError::invalid_data(
                "No columns left to split on after removing the class and ignored columns",
            ));
        }
        let features = resolve_features(self.config.features, usable);
        if let Some(requested) = self.config.features.filter(|&f| f > usable) {
            log::info!("Limiting features from {} to {}", requested, features);
            report.warnings.push(BuildWarning::FeaturesClamped {
                requested,
                used: features,
            });
        }

        let tasks = self.collect_tasks(local, minority, num_classes);
        report.remote_chunks = tasks.iter().filter(|t| t.payload.is_some()).count();

        // Pass 1: decode and filter.
        self.check_cancelled("the first pass")?;
        let mut scans: Vec<ChunkScan> = self
            .batch
            .try_map(tasks, |task| self.scan_chunk(task, num_classes, &codecs))?;
        report.rejected_rows = scans.iter().map(|s| s.rejected).sum();

        let valid: Vec<Vec<RowCount>> = scans.iter().map(|s| s.valid.clone()).collect();
        let (reserves, slots) = reserve(&valid, &plan.quotas);
        for (scan, reserved) in scans.iter_mut().zip(&reserves) {
            keep_reserved(scan, reserved);
        }

        // Bin bounds, one task per binned column.
        self.check_cancelled("binning")?;
        let per_scan = self.batch.map(scans.iter().collect::<Vec<_>>(), |scan| {
            binned_values(self.descriptor, scan, &binned)
        });
        let mut columns_values: Vec<Vec<f64>> = vec![Vec::new(); binned.len()];
        for values in per_scan {
            for (all, mine) in columns_values.iter_mut().zip(values) {
                all.extend(mine);
            }
        }
        let bin_limit = self.config.bin_limit;
        let binned_codecs = self
            .batch
            .map(columns_values, |values| ColumnCodec::binned(values, bin_limit));
        for (&col, codec) in binned.iter().zip(binned_codecs) {
            codecs[col] = codec;
        }

        // Pass 2: write codes into disjoint slots.
        self.check_cancelled("the second pass")?;
        let mut adapter = DataAdapter::allocate(
            codecs,
            self.config.class_column,
            &slots,
            self.config.class_weights.clone(),
            features,
        );
        let regions = regions(&reserves, &adapter);
        let codecs = (0..self.descriptor.num_columns())
            .map(|c| adapter.codec(c).clone())
            .collect::<Vec<_>>();
        {
            let (data, filled) = adapter.parts_mut();
            let per_task = carve(data.view_mut(), filled, regions, scans.len());
            let work: Vec<(ChunkScan, Vec<Slot<'_>>)> = scans.into_iter().zip(per_task).collect();
            self.batch.for_each(work, |(scan, slots)| {
                write_rows(self.descriptor, &codecs, &scan, slots)
            });
        }

        report.rows_per_class = adapter.rows_per_class();
        let filled = report.rows_per_class.clone();
        for (class, (&quota, &available)) in plan.quotas.iter().zip(&filled).enumerate() {
            if available < quota {
                report.warn(BuildWarning::InsufficientData {
                    class,
                    quota,
                    available,
                });
            }
        }
        log::info!(
            "training buffer of {}: {} rows in {} slots, {} rejected, {} remote chunks",
            self.descriptor.key,
            adapter.num_rows(),
            adapter.capacity(),
            report.rejected_rows,
            report.remote_chunks
        );
        Ok((adapter, report))
    }

    /// Codec of every column, with binned columns left as placeholders, and
    /// the indices of the binned columns.
    fn plan_codecs(&self, num_classes: usize) -> Result<(Vec<ColumnCodec>, Vec<ColumnIndex>)> {
        let ignored = self.config.sorted_ignores();
        let mut codecs = Vec::with_capacity(self.descriptor.num_columns());
        let mut binned = Vec::new();
        for (i, column) in self.descriptor.columns.iter().enumerate() {
            let codec = if i == self.config.class_column {
                ColumnCodec::Class {
                    min: column.min as i64,
                    num_classes,
                }
            } else if ignored.binary_search(&i).is_ok() {
                ColumnCodec::Ignored
            } else if ColumnCodec::needs_binning(column, self.config.bin_limit) {
                binned.push(i);
                ColumnCodec::Binned {
                    upper_bounds: Vec::new(),
                }
            } else {
                ColumnCodec::raw(column)
            };
            codecs.push(codec);
        }
        if let Some(&bad) = ignored.iter().find(|&&c| c >= codecs.len()) {
            return Err(DrfError::index_out_of_bounds(bad, codecs.len()));
        }
        Ok((codecs, binned))
    }

    /// Local chunks in histogram order, then remote minority chunks by address.
    fn collect_tasks(
        &self,
        local: &ChunkHistograms,
        minority: &[ChunkSelection],
        num_classes: usize,
    ) -> Vec<ChunkTask> {
        let mut tasks: Vec<ChunkTask> = local
            .keys()
            .iter()
            .zip(local.counts().outer_iter())
            .map(|(key, counts)| ChunkTask {
                key: key.clone(),
                payload: None,
                class_rows: counts.to_vec(),
            })
            .collect();

        let mut remote: BTreeMap<ChunkKey, ChunkTask> = BTreeMap::new();
        for selection in minority {
            for chunk in selection.remote() {
                let task = remote.entry(chunk.key.clone()).or_insert_with(|| ChunkTask {
                    key: chunk.key.clone(),
                    payload: chunk.payload.clone(),
                    class_rows: vec![0; num_classes],
                });
                if selection.class < num_classes {
                    task.class_rows[selection.class] = chunk.rows;
                }
            }
        }
        tasks.extend(remote.into_values());
        tasks
    }

    /// Accepts the valid rows of the classes the task takes.
    fn scan_chunk(
        &self,
        task: ChunkTask,
        num_classes: usize,
        codecs: &[ColumnCodec],
    ) -> Result<ChunkScan> {
        let payload = match task.payload {
            Some(p) => p,
            None => self
                .store
                .get(&task.key)
                .ok_or_else(|| DrfError::chunk_not_found(task.key.to_string()))?,
        };
        let d = self.descriptor;
        let checked: Vec<ColumnIndex> = (0..codecs.len()).filter(|&c| !codecs[c].is_ignored()).collect();

        let mut valid = vec![0usize; num_classes];
        let mut accepted = Vec::new();
        let mut rejected = 0;
        for r in 0..d.rows_in(&payload) {
            let row = d.row(&payload, r);
            let Some(class) = d.class_of(row, self.config.class_column, num_classes) else {
                rejected += 1;
                continue;
            };
            if task.class_rows[class] == 0 {
                continue;
            }
            if !checked.iter().all(|&c| d.columns[c].is_valid(row)) {
                rejected += 1;
                continue;
            }
            valid[class] += 1;
            accepted.push((r, class));
        }
        Ok(ChunkScan {
            payload,
            accepted,
            valid,
            rejected,
        })
    }
}

/// Per-task reservations, assigned in submission order from the valid rows
/// of each task, and the slots each class needs.
fn reserve(valid: &[Vec<RowCount>], quotas: &[RowCount]) -> (Vec<Vec<RowCount>>, Vec<RowCount>) {
    let mut used = vec![0usize; quotas.len()];
    let reserves = valid
        .iter()
        .map(|rows| {
            quotas
                .iter()
                .enumerate()
                .map(|(c, &quota)| {
                    let take = rows[c].min(quota - used[c]);
                    used[c] += take;
                    take
                })
                .collect()
        })
        .collect();
    (reserves, used)
}

/// Drops the accepted rows beyond the task's reservation.
fn keep_reserved(scan: &mut ChunkScan, reserved: &[RowCount]) {
    let mut taken = vec![0usize; reserved.len()];
    scan.accepted.retain(|&(_, class)| {
        taken[class] += 1;
        taken[class] <= reserved[class]
    });
}

/// Values of each binned column over the accepted rows of a scan.
fn binned_values(
    descriptor: &DatasetDescriptor,
    scan: &ChunkScan,
    binned: &[ColumnIndex],
) -> Vec<Vec<f64>> {
    binned
        .iter()
        .map(|&c| {
            scan.accepted
                .iter()
                .filter_map(|&(r, _)| {
                    descriptor.columns[c].value(descriptor.row(&scan.payload, r))
                })
                .collect()
        })
        .collect()
}

/// `(task, class, slot range)` of every non-empty reservation, sorted by slot.
fn regions(reserves: &[Vec<RowCount>], adapter: &DataAdapter) -> Vec<(usize, ClassIndex, Range<usize>)> {
    let num_classes = reserves.first().map(|r| r.len()).unwrap_or(0);
    let mut next: Vec<usize> = (0..num_classes).map(|c| adapter.class_interval(c).start).collect();
    let mut regions = Vec::new();
    for (t, reserved) in reserves.iter().enumerate() {
        for (c, &n) in reserved.iter().enumerate() {
            if n > 0 {
                regions.push((t, c, next[c]..next[c] + n));
                next[c] += n;
            }
        }
    }
    regions.sort_by_key(|r| r.2.start);
    regions
}

/// Splits the buffer into the disjoint slots of each task.
fn carve<'b>(
    mut rest: ArrayViewMut2<'b, BinCode>,
    mut rest_filled: &'b mut [bool],
    regions: Vec<(usize, ClassIndex, Range<usize>)>,
    num_tasks: usize,
) -> Vec<Vec<Slot<'b>>> {
    let mut per_task: Vec<Vec<Slot<'b>>> = (0..num_tasks).map(|_| Vec::new()).collect();
    let mut consumed = 0;
    for (task, class, range) in regions {
        let skip = range.start - consumed;
        let (_, tail) = rest.split_at(Axis(0), skip);
        let (rows, tail) = tail.split_at(Axis(0), range.len());
        rest = tail;
        let (_, ftail) = std::mem::take(&mut rest_filled).split_at_mut(skip);
        let (filled, ftail) = ftail.split_at_mut(range.len());
        rest_filled = ftail;
        consumed = range.end;
        per_task[task].push(Slot {
            class,
            rows,
            filled,
        });
    }
    per_task
}

fn write_rows(
    descriptor: &DatasetDescriptor,
    codecs: &[ColumnCodec],
    scan: &ChunkScan,
    mut slots: Vec<Slot<'_>>,
) {
    let mut cursor = vec![0usize; slots.len()];
    for &(r, class) in &scan.accepted {
        let Some(s) = slots.iter().position(|s| s.class == class) else {
            continue;
        };
        let slot = &mut slots[s];
        let i = cursor[s];
        if i >= slot.filled.len() {
            continue;
        }
        let row = descriptor.row(&scan.payload, r);
        for (col, codec) in codecs.iter().enumerate() {
            slot.rows[[i, col]] = codec.encode(&descriptor.columns[col], row);
        }
        slot.filled[i] = true;
        cursor[s] += 1;
    }
}
