//! Per-node class histograms and best-split search.
//!
//! A [`SplitStatistic`] is reused across tree nodes. For each node the tree
//! grower calls [`SplitStatistic::reset`], feeds every row of the node
//! through [`SplitStatistic::add`], and asks [`SplitStatistic::split`] for a
//! decision. Only the columns drawn at reset time are counted.

use crate::core::error::{DrfError, Result};
use crate::core::types::{BinCode, ClassIndex, ColumnIndex, StatType};
use crate::core::utils::random::max_index;
use crate::tree::criterion::{criterion_for, SplitCriterion};
use crate::tree::split::Split;
use ndarray::{Array2, Axis};
use rand::Rng;

/// Column layout of the data a split statistic reads.
pub trait SplitData {
    /// Number of columns, including the class and ignored columns
    fn num_columns(&self) -> usize;

    /// Number of classes
    fn num_classes(&self) -> usize;

    /// Number of distinct codes of `column`
    fn num_bins(&self, column: ColumnIndex) -> usize;

    /// True if `column` may be split on. False for the class column and
    /// ignored columns.
    fn is_candidate(&self, column: ColumnIndex) -> bool;

    /// Columns tried per node
    fn features(&self) -> usize;
}

/// One training row as the split statistic sees it.
pub trait ClassifiedRow {
    /// Code of `column`
    fn code(&self, column: ColumnIndex) -> BinCode;

    /// Class of the row
    fn class(&self) -> ClassIndex;
}

/// Column × bin × class histograms of the rows of one tree node.
#[derive(Debug)]
pub struct SplitStatistic {
    /// `column_dists[col][[bin, class]]`; empty for non-candidate columns
    column_dists: Vec<Array2<usize>>,
    candidates: Vec<ColumnIndex>,
    columns: Vec<ColumnIndex>,
    chosen: Vec<bool>,
    features: usize,
    num_classes: usize,
    criterion: Box<dyn SplitCriterion>,
    exclusion_splits: bool,
}

impl SplitStatistic {
    /// Allocates histograms for every candidate column of `data`.
    pub fn new<D: SplitData + ?Sized>(data: &D, stat: StatType, exclusion_splits: bool) -> Result<Self> {
        let candidates: Vec<ColumnIndex> = (0..data.num_columns())
            .filter(|&c| data.is_candidate(c))
            .collect();
        let features = data.features();
        if features == 0 || features > candidates.len() {
            return Err(DrfError::invalid_parameter(
                "features",
                features.to_string(),
                format!("must be in 1..={} usable columns", candidates.len()),
            ));
        }
        let num_classes = data.num_classes();
        let column_dists = (0..data.num_columns())
            .map(|c| {
                if data.is_candidate(c) {
                    Array2::zeros((data.num_bins(c).max(1), num_classes))
                } else {
                    Array2::zeros((0, 0))
                }
            })
            .collect();
        Ok(SplitStatistic {
            column_dists,
            candidates,
            columns: Vec::with_capacity(features),
            chosen: vec![false; data.num_columns()],
            features,
            num_classes,
            criterion: criterion_for(stat),
            exclusion_splits,
        })
    }

    /// Columns drawn at the last reset, in draw order
    pub fn columns(&self) -> &[ColumnIndex] {
        &self.columns
    }

    /// Histogram of `column`, `(bins × classes)`
    pub fn column_dist(&self, column: ColumnIndex) -> &Array2<usize> {
        &self.column_dists[column]
    }

    /// Draws a fresh column subset and clears its histograms.
    ///
    /// Columns are drawn uniformly among the candidates, rejecting columns
    /// already drawn until `features` distinct ones are chosen.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for &c in &self.columns {
            self.chosen[c] = false;
        }
        self.columns.clear();
        while self.columns.len() < self.features {
            let col = self.candidates[rng.gen_range(0..self.candidates.len())];
            if self.chosen[col] {
                continue;
            }
            self.chosen[col] = true;
            self.columns.push(col);
            self.column_dists[col].fill(0);
        }
    }

    /// Counts one row in every drawn column.
    pub fn add<R: ClassifiedRow + ?Sized>(&mut self, row: &R) {
        let class = row.class();
        for &col in &self.columns {
            self.column_dists[col][[row.code(col) as usize, class]] += 1;
        }
    }

    /// Best split over the drawn columns.
    ///
    /// Returns a constant split if all rows share one class. Otherwise each
    /// drawn column is searched and the strictly best split kept, so ties go
    /// to the column drawn first.
    pub fn split<R: Rng + ?Sized>(&self, rng: &mut R) -> Split {
        let Some(&first) = self.columns.first() else {
            return Split::Impossible { class: 0 };
        };
        let dist = self.class_totals(first);
        let weight: usize = dist.iter().sum();
        let majority = max_index(&dist, rng);
        if dist[majority] == weight {
            return Split::Constant { class: majority };
        }

        let mut best: Option<Split> = None;
        for &col in &self.columns {
            let mut candidate = self.column_split(col, rng);
            if self.exclusion_splits {
                let exclusion = self.column_exclusion(col, rng);
                if exclusion.better_than(&candidate) {
                    candidate = exclusion;
                }
            }
            if best.map_or(true, |b| candidate.better_than(&b)) {
                best = Some(candidate);
            }
        }
        best.unwrap_or(Split::Impossible { class: majority })
    }

    /// Best `code <= i` split of `column`.
    pub fn column_split<R: Rng + ?Sized>(&self, column: ColumnIndex, rng: &mut R) -> Split {
        let hist = &self.column_dists[column];
        let total = self.class_totals(column);
        let weight: usize = total.iter().sum();

        let mut left = vec![0usize; self.num_classes];
        let mut right = vec![0usize; self.num_classes];
        let mut left_weight = 0usize;
        let mut best: Option<Split> = None;
        let bins = hist.nrows();
        for i in 0..bins.saturating_sub(1) {
            for (k, &n) in hist.row(i).iter().enumerate() {
                left[k] += n;
                left_weight += n;
            }
            let right_weight = weight - left_weight;
            if left_weight == 0 || right_weight == 0 {
                continue;
            }
            for k in 0..self.num_classes {
                right[k] = total[k] - left[k];
            }
            let fitness = self
                .criterion
                .fitness(&left, left_weight, &right, right_weight);
            if best.map_or(true, |b| fitness > b.fitness()) {
                best = Some(Split::Column {
                    column,
                    split_point: i as BinCode,
                    fitness,
                });
            }
        }
        best.unwrap_or_else(|| Split::Impossible {
            class: max_index(&total, rng),
        })
    }

    /// Best `code == i` versus rest split of `column`, over every bin but the last.
    pub fn column_exclusion<R: Rng + ?Sized>(&self, column: ColumnIndex, rng: &mut R) -> Split {
        let hist = &self.column_dists[column];
        let total = self.class_totals(column);
        let weight: usize = total.iter().sum();

        let mut right = vec![0usize; self.num_classes];
        let mut best: Option<Split> = None;
        for i in 0..hist.nrows().saturating_sub(1) {
            let left = hist.row(i).to_vec();
            let left_weight: usize = left.iter().sum();
            let right_weight = weight - left_weight;
            if left_weight == 0 || right_weight == 0 {
                continue;
            }
            for k in 0..self.num_classes {
                right[k] = total[k] - left[k];
            }
            let fitness = self
                .criterion
                .fitness(&left, left_weight, &right, right_weight);
            if best.map_or(true, |b| fitness > b.fitness()) {
                best = Some(Split::Exclusion {
                    column,
                    split_point: i as BinCode,
                    fitness,
                });
            }
        }
        best.unwrap_or_else(|| Split::Impossible {
            class: max_index(&total, rng),
        })
    }

    fn class_totals(&self, column: ColumnIndex) -> Vec<usize> {
        self.column_dists[column].sum_axis(Axis(0)).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Grid {
        bins: Vec<usize>,
        classes: usize,
        features: usize,
    }

    impl SplitData for Grid {
        fn num_columns(&self) -> usize {
            self.bins.len() + 1
        }
        fn num_classes(&self) -> usize {
            self.classes
        }
        fn num_bins(&self, column: ColumnIndex) -> usize {
            self.bins.get(column).copied().unwrap_or(self.classes)
        }
        fn is_candidate(&self, column: ColumnIndex) -> bool {
            column < self.bins.len()
        }
        fn features(&self) -> usize {
            self.features
        }
    }

    struct R(Vec<BinCode>, ClassIndex);

    impl ClassifiedRow for R {
        fn code(&self, column: ColumnIndex) -> BinCode {
            self.0[column]
        }
        fn class(&self) -> ClassIndex {
            self.1
        }
    }

    fn grid(bins: Vec<usize>, classes: usize, features: usize) -> Grid {
        Grid {
            bins,
            classes,
            features,
        }
    }

    #[test]
    fn test_perfect_split() {
        let data = grid(vec![9], 2, 1);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, false).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        stat.reset(&mut rng);
        for (code, class) in [(0, 0), (0, 0), (8, 1), (8, 1)] {
            stat.add(&R(vec![code], class));
        }
        match stat.split(&mut rng) {
            Split::Column {
                column,
                split_point,
                fitness,
            } => {
                assert_eq!(column, 0);
                assert_eq!(split_point, 0);
                assert_abs_diff_eq!(fitness, 1.0);
            }
            other => panic!("expected a column split, got {:?}", other),
        }
    }

    #[test]
    fn test_single_class_is_constant() {
        let data = grid(vec![4, 4], 3, 2);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, false).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        stat.reset(&mut rng);
        for code in 0..4 {
            stat.add(&R(vec![code, 3 - code], 2));
        }
        assert_eq!(stat.split(&mut rng), Split::Constant { class: 2 });
    }

    #[test]
    fn test_no_boundary_is_impossible() {
        let data = grid(vec![3], 2, 1);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, false).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        stat.reset(&mut rng);
        stat.add(&R(vec![1], 0));
        stat.add(&R(vec![1], 1));
        stat.add(&R(vec![1], 1));
        assert_eq!(stat.split(&mut rng), Split::Impossible { class: 1 });
    }

    #[test]
    fn test_reset_draws_distinct_columns_and_clears() {
        let data = grid(vec![2; 6], 2, 4);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, false).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            stat.reset(&mut rng);
            let mut cols = stat.columns().to_vec();
            assert_eq!(cols.len(), 4);
            assert!(cols.iter().all(|&c| c < 6));
            cols.sort();
            cols.dedup();
            assert_eq!(cols.len(), 4);
            for &c in stat.columns() {
                assert_eq!(stat.column_dist(c).sum(), 0);
            }
            stat.add(&R(vec![1; 6], 0));
        }
    }

    #[test]
    fn test_exclusion_split() {
        // class 1 sits in the middle bin only; no prefix boundary isolates it
        let data = grid(vec![3], 2, 1);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, true).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        stat.reset(&mut rng);
        for (code, class) in [(0, 0), (0, 0), (1, 1), (1, 1), (2, 0), (2, 0)] {
            stat.add(&R(vec![code], class));
        }
        let exclusion = stat.column_exclusion(0, &mut rng);
        assert_eq!(
            exclusion,
            Split::Exclusion {
                column: 0,
                split_point: 1,
                fitness: 1.0
            }
        );
        let prefix = stat.column_split(0, &mut rng);
        assert!(prefix.fitness() < 1.0);
        assert_eq!(stat.split(&mut rng), exclusion);
    }

    #[test]
    fn test_exclusion_skips_the_last_bin() {
        // only the last bin is pure, and it is not a candidate
        let data = grid(vec![3], 2, 1);
        let mut stat = SplitStatistic::new(&data, StatType::Gini, true).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        stat.reset(&mut rng);
        for (code, class) in [(0, 0), (1, 0), (2, 1), (2, 1)] {
            stat.add(&R(vec![code], class));
        }
        match stat.column_exclusion(0, &mut rng) {
            Split::Exclusion {
                column,
                split_point,
                fitness,
            } => {
                assert_eq!(column, 0);
                assert_eq!(split_point, 0);
                assert_abs_diff_eq!(fitness, 2.0 / 3.0, epsilon = 1e-12);
            }
            other => panic!("expected an exclusion split, got {:?}", other),
        }
    }

    #[test]
    fn test_features_out_of_range() {
        assert!(SplitStatistic::new(&grid(vec![2], 2, 2), StatType::Gini, false).is_err());
        assert!(SplitStatistic::new(&grid(vec![2], 2, 0), StatType::Gini, false).is_err());
    }
}
