//! Impurity measures used to score candidate splits.

use crate::core::types::StatType;

/// Scores a two-way partition of class counts.
pub trait SplitCriterion: Send + Sync + std::fmt::Debug {
    /// Impurity of a class distribution holding `weight` rows in total.
    fn impurity(&self, dist: &[usize], weight: usize) -> f64;

    /// `1 - (impurity(left) * wl + impurity(right) * wr) / (wl + wr)`.
    ///
    /// Both weighted impurities are subtracted, so fitness never exceeds 1.
    fn fitness(&self, left: &[usize], left_weight: usize, right: &[usize], right_weight: usize) -> f64 {
        let total = (left_weight + right_weight) as f64;
        if total == 0.0 {
            return 0.0;
        }
        let weighted = self.impurity(left, left_weight) * left_weight as f64
            + self.impurity(right, right_weight) * right_weight as f64;
        1.0 - weighted / total
    }
}

/// Gini impurity, `1 - sum(p_k^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gini;

impl SplitCriterion for Gini {
    fn impurity(&self, dist: &[usize], weight: usize) -> f64 {
        if weight == 0 {
            return 0.0;
        }
        let w = weight as f64;
        1.0 - dist
            .iter()
            .map(|&d| {
                let p = d as f64 / w;
                p * p
            })
            .sum::<f64>()
    }
}

/// Shannon entropy in bits, `-sum(p_k * log2(p_k))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entropy;

impl SplitCriterion for Entropy {
    fn impurity(&self, dist: &[usize], weight: usize) -> f64 {
        if weight == 0 {
            return 0.0;
        }
        let w = weight as f64;
        -dist
            .iter()
            .filter(|&&d| d > 0)
            .map(|&d| {
                let p = d as f64 / w;
                p * p.log2()
            })
            .sum::<f64>()
    }
}

/// Criterion implementing `stat`.
pub fn criterion_for(stat: StatType) -> Box<dyn SplitCriterion> {
    match stat {
        StatType::Gini => Box::new(Gini),
        StatType::Entropy => Box::new(Entropy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gini_impurity() {
        assert_abs_diff_eq!(Gini.impurity(&[5, 0], 5), 0.0);
        assert_abs_diff_eq!(Gini.impurity(&[2, 2], 4), 0.5);
        assert_abs_diff_eq!(Gini.impurity(&[0, 0], 0), 0.0);
    }

    #[test]
    fn test_entropy_impurity() {
        assert_abs_diff_eq!(Entropy.impurity(&[4, 0], 4), 0.0);
        assert_abs_diff_eq!(Entropy.impurity(&[2, 2], 4), 1.0);
        assert_abs_diff_eq!(Entropy.impurity(&[1, 1, 1, 1], 4), 2.0);
    }

    #[test]
    fn test_pure_partition_scores_one() {
        assert_abs_diff_eq!(Gini.fitness(&[2, 0], 2, &[0, 2], 2), 1.0);
        assert_abs_diff_eq!(Entropy.fitness(&[2, 0], 2, &[0, 2], 2), 1.0);
    }

    #[test]
    fn test_both_sides_impure_stays_below_one() {
        // each side gini 0.5 on 2 rows: 1 - (0.5*2 + 0.5*2)/4
        assert_abs_diff_eq!(Gini.fitness(&[1, 1], 2, &[1, 1], 2), 0.5);
        assert!(Entropy.fitness(&[3, 1], 4, &[1, 3], 4) < 1.0);
    }

    #[test]
    fn test_mixed_partition() {
        // left gini 0.5 on 2 rows, right pure on 2 rows: 1 - 0.5*2/4
        assert_abs_diff_eq!(Gini.fitness(&[1, 1], 2, &[0, 2], 2), 0.75);
        assert_eq!(format!("{:?}", criterion_for(StatType::Entropy)), "Entropy");
    }
}
