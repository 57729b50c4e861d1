//! Common test utilities for DRF Rust integration tests.

#![allow(dead_code)]

use drf_rust::dataset::EncodedDataset;
use drf_rust::*;
use rand::prelude::*;
use std::sync::Arc;

/// Column index of the class in [`skewed_dataset`] and [`random_dataset`]
pub const CLASS_COLUMN: usize = 3;

/// Encodes `rows` with the given `(name, width)` columns.
pub fn encode(
    key: &str,
    rows_per_chunk: usize,
    columns: &[(&str, i8)],
    rows: &[Vec<Option<f64>>],
) -> anyhow::Result<EncodedDataset> {
    let mut writer = DatasetWriter::new(key, rows_per_chunk);
    for &(name, width) in columns {
        writer = writer.column(name, width, 0, 1);
    }
    for row in rows {
        writer.push_row(row)?;
    }
    Ok(writer.finish()?)
}

/// 300 rows in 12 chunks of 25. Rows 280.. are class 1, the rest class 0,
/// so class 1 lives only in the last chunk.
pub fn skewed_dataset() -> anyhow::Result<EncodedDataset> {
    let rows: Vec<Vec<Option<f64>>> = (0..300)
        .map(|i| {
            let class = if i >= 280 { 1.0 } else { 0.0 };
            vec![
                Some(f64::from(i % 40)),
                Some(f64::from(i) * 0.25),
                Some(f64::from(i * 7 % 3000)),
                Some(class),
            ]
        })
        .collect();
    encode(
        "skewed.hex",
        25,
        &[("a", 1), ("b", -8), ("c", 2), ("class", 1)],
        &rows,
    )
}

/// Random rows over `num_classes` classes; every class occurs at least once.
/// With `missing`, about one row in twenty has a missing value in column 1.
pub fn random_dataset(
    seed: u64,
    num_rows: usize,
    num_classes: u8,
    rows_per_chunk: usize,
    missing: bool,
) -> anyhow::Result<EncodedDataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<Vec<Option<f64>>> = (0..num_rows.max(usize::from(num_classes)))
        .map(|i| {
            let class = if i < usize::from(num_classes) {
                i as u8
            } else {
                rng.gen_range(0..num_classes)
            };
            let b = if missing && rng.gen_ratio(1, 20) {
                None
            } else {
                Some(rng.gen_range(-10.0..10.0))
            };
            vec![
                Some(f64::from(rng.gen_range(0u8..50))),
                b,
                Some(f64::from(rng.gen_range(0i16..3000))),
                Some(f64::from(class)),
            ]
        })
        .collect();
    encode(
        "random.hex",
        rows_per_chunk,
        &[("a", 1), ("b", -8), ("c", 2), ("class", 1)],
        &rows,
    )
}

/// A cluster of `num_nodes` nodes holding `dataset`, chunk `i` homed on
/// node `i % num_nodes`, with a service registered on every node.
pub fn round_robin_cluster(
    dataset: &EncodedDataset,
    num_nodes: u16,
) -> anyhow::Result<(Arc<InMemoryCluster>, Vec<Arc<NodeService>>)> {
    let cluster = Arc::new(InMemoryCluster::new(num_nodes));
    dataset.distribute(&cluster, |i| NodeId((i % num_nodes as usize) as u16));
    let services = register_services(&cluster, 2)?;
    Ok((cluster, services))
}

/// Rows per class whose non-ignored columns are all valid.
pub fn valid_rows_per_class(
    dataset: &EncodedDataset,
    class_column: usize,
    ignored: &[usize],
) -> Vec<usize> {
    let d = &dataset.descriptor;
    let num_classes = d.num_classes(class_column).unwrap_or(0);
    let mut counts = vec![0; num_classes];
    for chunk in &dataset.chunks {
        for r in 0..d.rows_in(chunk) {
            let row = d.row(chunk, r);
            let valid = (0..d.num_columns())
                .filter(|c| !ignored.contains(c))
                .all(|c| d.columns[c].is_valid(row));
            if valid {
                if let Some(class) = d.class_of(row, class_column, num_classes) {
                    counts[class] += 1;
                }
            }
        }
    }
    counts
}
