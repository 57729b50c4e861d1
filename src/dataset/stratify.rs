//! Per-class row quotas for stratified sampling.
//!
//! Every node contributes the same number of rows of each class:
//! `quota = min(global, max(min_quota, round(fraction * global / nodes)))`
//! where `min_quota` is the per-node share of the majority class shifted
//! right by [`MIN_QUOTA_SHIFT`]. Rare classes therefore keep a small floor
//! relative to the majority class instead of vanishing after sampling.

use crate::config::StratumOverride;
use crate::core::constants::MIN_QUOTA_SHIFT;
use crate::core::types::{ClassIndex, RowCount};
use crate::dataset::report::BuildWarning;
use serde::{Deserialize, Serialize};

/// Row quota of each class on every participating node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratificationPlan {
    /// Rows per class each node must contribute
    pub quotas: Vec<RowCount>,
    /// Floor applied to every class
    pub min_quota: RowCount,
    /// Conditions noticed while planning
    pub warnings: Vec<BuildWarning>,
}

impl StratificationPlan {
    /// Plan taking exactly `quotas`, used when stratification is off.
    pub fn from_quotas(quotas: Vec<RowCount>) -> Self {
        StratificationPlan {
            quotas,
            min_quota: 0,
            warnings: Vec::new(),
        }
    }

    /// Sum of all quotas
    pub fn total_rows(&self) -> RowCount {
        self.quotas.iter().sum()
    }

    /// Classes whose node-local count is below the quota.
    pub fn under_represented(&self, local: &[RowCount]) -> Vec<ClassIndex> {
        self.quotas
            .iter()
            .enumerate()
            .filter(|&(c, &q)| local.get(c).copied().unwrap_or(0) < q)
            .map(|(c, _)| c)
            .collect()
    }
}

/// Computes stratification plans from global class counts.
#[derive(Debug, Clone)]
pub struct Stratifier<'a> {
    sample_fraction: f64,
    num_nodes: usize,
    overrides: &'a [StratumOverride],
}

impl<'a> Stratifier<'a> {
    /// Stratifier for `num_nodes` participating nodes. `num_nodes` is
    /// treated as at least 1.
    pub fn new(sample_fraction: f64, num_nodes: usize, overrides: &'a [StratumOverride]) -> Self {
        Stratifier {
            sample_fraction,
            num_nodes: num_nodes.max(1),
            overrides,
        }
    }

    fn share(&self, count: RowCount) -> RowCount {
        round_half_up(self.sample_fraction * count as f64 / self.num_nodes as f64)
    }

    /// Quotas for the given global class counts. Never fails.
    pub fn plan(&self, global: &[RowCount]) -> StratificationPlan {
        let majority = global.iter().copied().max().unwrap_or(0);
        let per_node_majority = self.share(majority);
        let min_quota = per_node_majority >> MIN_QUOTA_SHIFT;

        let mut quotas: Vec<RowCount> = global
            .iter()
            .map(|&g| g.min(min_quota.max(self.share(g))))
            .collect();

        let mut warnings = Vec::new();
        for o in self.overrides {
            match usize::try_from(o.class).ok().filter(|&c| c < quotas.len()) {
                Some(c) => quotas[c] = o.rows,
                None => {
                    let w = BuildWarning::IgnoredStratum { class: o.class };
                    log::warn!("{}", w);
                    warnings.push(w);
                }
            }
        }

        if self.sample_fraction > 0.0 {
            for (c, (&g, &q)) in global.iter().zip(&quotas).enumerate() {
                if (g as f64) < q as f64 / self.sample_fraction {
                    let w = BuildWarning::Oversampled { class: c };
                    log::warn!("{}", w);
                    warnings.push(w);
                }
            }
        }

        log::debug!(
            "stratification over {} nodes: min quota {}, quotas {:?}",
            self.num_nodes,
            min_quota,
            quotas
        );
        StratificationPlan {
            quotas,
            min_quota,
            warnings,
        }
    }
}

/// Rounds half up, `floor(x + 0.5)`.
pub fn round_half_up(x: f64) -> RowCount {
    (x + 0.5).floor().max(0.0) as RowCount
}
