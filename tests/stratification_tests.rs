//! Quota planning across a cluster.

use drf_rust::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn quotas_stay_within_global_counts(
        global in prop::collection::vec(0usize..20_000, 2..8),
        fraction in 0.0f64..=1.0,
        nodes in 1usize..16,
    ) {
        let plan = Stratifier::new(fraction, nodes, &[]).plan(&global);
        prop_assert_eq!(plan.quotas.len(), global.len());
        for (&q, &g) in plan.quotas.iter().zip(&global) {
            prop_assert!(q <= g);
        }
    }

    #[test]
    fn quotas_grow_with_sample_fraction(
        global in prop::collection::vec(0usize..20_000, 2..8),
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        nodes in 1usize..16,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let small = Stratifier::new(low, nodes, &[]).plan(&global);
        let large = Stratifier::new(high, nodes, &[]).plan(&global);
        for (s, l) in small.quotas.iter().zip(&large.quotas) {
            prop_assert!(s <= l);
        }
        prop_assert!(small.min_quota <= large.min_quota);
    }
}

#[test]
fn test_minority_keeps_share_of_majority() {
    // 600_000 rows of the majority over 2 nodes at fraction 1: min quota is
    // 300_000 >> 9 = 585, above the 2 rows the minority share rounds to.
    let plan = Stratifier::new(1.0, 2, &[]).plan(&[600_000, 4_000, 4]);
    assert_eq!(plan.min_quota, 585);
    assert_eq!(plan.quotas, vec![300_000, 2_000, 4]);
}

#[test]
fn test_overrides_and_warnings() {
    let overrides = [
        StratumOverride { class: 1, rows: 900 },
        StratumOverride { class: 7, rows: 3 },
        StratumOverride { class: -1, rows: 3 },
    ];
    let plan = Stratifier::new(0.5, 2, &overrides).plan(&[1000, 1000]);
    assert_eq!(plan.quotas, vec![250, 900]);
    assert_eq!(
        plan.warnings,
        vec![
            BuildWarning::IgnoredStratum { class: 7 },
            BuildWarning::IgnoredStratum { class: -1 },
            BuildWarning::Oversampled { class: 1 },
        ]
    );
}

#[test]
fn test_zero_fraction_plans_nothing() {
    let plan = Stratifier::new(0.0, 3, &[]).plan(&[500, 20]);
    assert_eq!(plan.quotas, vec![0, 0]);
    assert_eq!(plan.total_rows(), 0);
    assert!(plan.warnings.is_empty());
}

#[test]
fn test_under_represented_classes() {
    let plan = StratificationPlan::from_quotas(vec![10, 5, 0]);
    assert_eq!(plan.under_represented(&[10, 4, 0]), vec![1]);
    assert_eq!(plan.under_represented(&[0]), vec![0, 1]);
}
