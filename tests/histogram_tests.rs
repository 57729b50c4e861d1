//! Class histograms built per node agree with a single pass over the dataset.

mod common;

use common::encode;
use drf_rust::core::utils::threading::TaskBatch;
use drf_rust::*;
use proptest::prelude::*;

fn dataset_from_classes(classes: &[u8], rows_per_chunk: usize) -> dataset::EncodedDataset {
    let rows: Vec<Vec<Option<f64>>> = [0u8, 2]
        .iter()
        .chain(classes)
        .enumerate()
        .map(|(i, &c)| vec![Some((i % 7) as f64), Some(f64::from(c))])
        .collect();
    encode("hist.hex", rows_per_chunk, &[("x", 1), ("class", 1)], &rows)
        .expect("encodable rows")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn merged_node_histograms_equal_single_pass(
        classes in prop::collection::vec(0u8..3, 0..200),
        rows_per_chunk in 1usize..20,
        num_nodes in 1u16..5,
    ) {
        let ds = dataset_from_classes(&classes, rows_per_chunk);
        let cluster = InMemoryCluster::new(num_nodes);
        ds.distribute(&cluster, |i| NodeId((i % num_nodes as usize) as u16));
        let batch = TaskBatch::new(2).unwrap();
        let builder = HistogramBuilder::new(&ds.descriptor, 1).unwrap();

        let single = builder
            .build_local(&cluster, ds.descriptor.chunk_keys(), &batch)
            .unwrap();

        let parts: Vec<ChunkHistograms> = cluster
            .nodes()
            .into_iter()
            .rev()
            .map(|node| {
                let keys = ds
                    .descriptor
                    .chunk_keys()
                    .into_iter()
                    .filter(|k| cluster.resolve_home(k) == node)
                    .collect();
                builder.build_local(&cluster, keys, &batch).unwrap()
            })
            .collect();
        let merged = ChunkHistograms::merge(parts).unwrap();

        prop_assert_eq!(merged.keys(), single.keys());
        prop_assert_eq!(merged.counts(), single.counts());

        let mut expected = vec![0usize; 3];
        expected[0] += 1;
        expected[2] += 1;
        for &c in &classes {
            expected[usize::from(c)] += 1;
        }
        prop_assert_eq!(merged.totals(), expected);
    }
}

#[test]
fn test_missing_class_values_are_not_counted() -> anyhow::Result<()> {
    let rows = vec![
        vec![Some(1.0), Some(0.0)],
        vec![Some(2.0), None],
        vec![Some(3.0), Some(1.0)],
        vec![None, Some(1.0)],
    ];
    let ds = encode("gaps.hex", 3, &[("x", 1), ("class", 1)], &rows)?;
    let cluster = InMemoryCluster::new(1);
    ds.distribute(&cluster, |_| NodeId(0));

    let histograms = HistogramBuilder::new(&ds.descriptor, 1)?.build_local(
        &cluster,
        ds.descriptor.chunk_keys(),
        &TaskBatch::default(),
    )?;
    assert_eq!(histograms.num_chunks(), 2);
    // A missing feature does not affect the count, a missing class does.
    assert_eq!(histograms.totals(), vec![1, 2]);
    Ok(())
}

#[test]
fn test_chunk_missing_from_store_fails() -> anyhow::Result<()> {
    let ds = common::skewed_dataset()?;
    let cluster = InMemoryCluster::new(1);
    ds.distribute(&cluster, |_| NodeId(0));
    let gone = ds.descriptor.chunk_key(3);
    cluster.remove(&gone);

    let err = HistogramBuilder::new(&ds.descriptor, common::CLASS_COLUMN)?
        .build_local(&cluster, ds.descriptor.chunk_keys(), &TaskBatch::default())
        .unwrap_err();
    assert!(matches!(err, DrfError::ChunkNotFound { .. }));
    Ok(())
}
