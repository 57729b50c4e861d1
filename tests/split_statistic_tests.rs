//! Split search over buffers built from encoded chunks.

mod common;

use approx::assert_abs_diff_eq;
use common::encode;
use drf_rust::core::utils::threading::TaskBatch;
use drf_rust::tree::{Gini, SplitCriterion};
use drf_rust::*;
use proptest::prelude::*;
use rand::prelude::*;

/// Buffer holding every row of a two-column `(feature, class)` dataset.
fn buffer(rows: &[(f64, f64)], features: usize) -> anyhow::Result<DataAdapter> {
    let rows: Vec<Vec<Option<f64>>> = rows.iter().map(|&(x, c)| vec![Some(x), Some(c)]).collect();
    let ds = encode("split.hex", 2, &[("feature", 1), ("class", 1)], &rows)?;
    let cluster = InMemoryCluster::new(1);
    ds.distribute(&cluster, |_| NodeId(0));
    let batch = TaskBatch::default();
    let local = HistogramBuilder::new(&ds.descriptor, 1)?.build_local(
        &cluster,
        ds.descriptor.chunk_keys(),
        &batch,
    )?;
    let config = ForestConfigBuilder::new()
        .class_column(1)
        .features(features)
        .build()?;
    let plan = StratificationPlan::from_quotas(local.totals());
    let (adapter, _) =
        TrainingBufferBuilder::new(&ds.descriptor, &config, &cluster, &batch).build(&local, &[], &plan)?;
    Ok(adapter)
}

#[test]
fn test_perfect_split_through_buffer() -> anyhow::Result<()> {
    let adapter = buffer(&[(1.0, 0.0), (1.0, 0.0), (9.0, 1.0), (9.0, 1.0)], 1)?;
    let mut rng = StdRng::seed_from_u64(42);
    let mut stat = SplitStatistic::new(&adapter, StatType::Gini, false)?;
    stat.reset(&mut rng);
    assert_eq!(stat.columns(), &[0]);
    for row in adapter.rows() {
        stat.add(&row);
    }

    match stat.split(&mut rng) {
        Split::Column {
            column,
            split_point,
            fitness,
        } => {
            assert_eq!(column, 0);
            assert_eq!(split_point, 0);
            assert_abs_diff_eq!(fitness, 1.0, epsilon = 1e-12);
        }
        other => panic!("expected a column split, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_entropy_scores_perfect_split_as_one() -> anyhow::Result<()> {
    let adapter = buffer(&[(1.0, 0.0), (2.0, 0.0), (8.0, 1.0), (9.0, 1.0)], 1)?;
    let mut rng = StdRng::seed_from_u64(1);
    let mut stat = SplitStatistic::new(&adapter, StatType::Entropy, false)?;
    stat.reset(&mut rng);
    adapter.rows().for_each(|row| stat.add(&row));

    let split = stat.split(&mut rng);
    assert_eq!(split.column(), Some(0));
    assert_abs_diff_eq!(split.fitness(), 1.0, epsilon = 1e-12);
    // Codes 0 and 1 hold class 0; the first boundary past them wins.
    assert!(split.goes_left(1));
    assert!(!split.goes_left(7));
    Ok(())
}

#[test]
fn test_single_class_rows_are_constant() -> anyhow::Result<()> {
    let adapter = buffer(&[(1.0, 0.0), (3.0, 1.0), (5.0, 1.0), (7.0, 1.0)], 1)?;
    let mut rng = StdRng::seed_from_u64(3);
    let mut stat = SplitStatistic::new(&adapter, StatType::Gini, false)?;
    stat.reset(&mut rng);
    adapter
        .rows()
        .filter(|r| r.class() == 1)
        .for_each(|row| stat.add(&row));

    let split = stat.split(&mut rng);
    assert_eq!(split, Split::Constant { class: 1 });
    assert!(split.is_leaf());
    assert_eq!(split.fitness(), -1.0);
    Ok(())
}

#[test]
fn test_exclusion_split_isolates_middle_value() -> anyhow::Result<()> {
    let rows = [
        (1.0, 0.0),
        (1.0, 0.0),
        (5.0, 1.0),
        (5.0, 1.0),
        (9.0, 0.0),
        (9.0, 0.0),
    ];
    let adapter = buffer(&rows, 1)?;
    let mut rng = StdRng::seed_from_u64(5);

    let mut plain = SplitStatistic::new(&adapter, StatType::Gini, false)?;
    plain.reset(&mut rng);
    adapter.rows().for_each(|row| plain.add(&row));
    match plain.split(&mut rng) {
        Split::Column {
            split_point,
            fitness,
            ..
        } => {
            assert_eq!(split_point, 0);
            assert_abs_diff_eq!(fitness, 2.0 / 3.0, epsilon = 1e-12);
        }
        other => panic!("expected a column split, got {:?}", other),
    }

    let mut with_exclusion = SplitStatistic::new(&adapter, StatType::Gini, true)?;
    with_exclusion.reset(&mut rng);
    adapter.rows().for_each(|row| with_exclusion.add(&row));
    let split = with_exclusion.split(&mut rng);
    assert!(matches!(
        split,
        Split::Exclusion {
            column: 0,
            split_point: 4,
            ..
        }
    ));
    assert_abs_diff_eq!(split.fitness(), 1.0, epsilon = 1e-12);
    assert!(split.goes_left(4));
    assert!(!split.goes_left(0));
    assert!(!split.goes_left(8));
    Ok(())
}

#[test]
fn test_reset_clears_previous_node() -> anyhow::Result<()> {
    let adapter = buffer(&[(1.0, 0.0), (1.0, 0.0), (9.0, 1.0), (9.0, 1.0)], 1)?;
    let mut rng = StdRng::seed_from_u64(9);
    let mut stat = SplitStatistic::new(&adapter, StatType::Gini, false)?;
    stat.reset(&mut rng);
    adapter.rows().for_each(|row| stat.add(&row));
    assert_eq!(stat.column_dist(0).sum(), 4);

    stat.reset(&mut rng);
    assert_eq!(stat.column_dist(0).sum(), 0);
    Ok(())
}

proptest! {
    // Two classes, both sides of size `w`: a pure left side scores at least
    // as well as any split leaving both sides mixed.
    #[test]
    fn pure_left_side_beats_two_mixed_sides(w in 2usize..60, extra in 0usize..60) {
        let class0 = w + extra.min(w);
        let class1 = 2 * w - class0;
        let pure = Gini.fitness(&[w, 0], w, &[class0 - w, class1], w);
        for x in 1..w {
            let (l0, l1) = (x, w - x);
            if l0 > class0 || l1 > class1 {
                continue;
            }
            let (r0, r1) = (class0 - l0, class1 - l1);
            if r0 == 0 || r1 == 0 {
                continue;
            }
            let mixed = Gini.fitness(&[l0, l1], w, &[r0, r1], w);
            prop_assert!(pure + 1e-12 >= mixed, "pure {} < mixed {}", pure, mixed);
        }
    }
}
