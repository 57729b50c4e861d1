//! Core configuration structure and builder for forest training.

use crate::core::constants::*;
use crate::core::error::{DrfError, Result};
use crate::core::types::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Caller-supplied row quota for one class, replacing the computed one.
///
/// `class` is signed so that malformed input survives parsing; indices
/// outside `0..num_classes` are skipped with a warning when the plan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumOverride {
    /// Class index (class value minus the class column minimum)
    pub class: i64,
    /// Rows this class must contribute on each node
    pub rows: usize,
}

/// Main configuration structure for distributed forest training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Total number of trees in the forest
    pub num_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Split statistic
    pub statistic: StatType,
    /// Column holding the class label
    pub class_column: ColumnIndex,
    /// Columns excluded from training
    pub ignored_columns: Vec<ColumnIndex>,
    /// Proportion of observations used for each tree, in `[0, 1]`
    pub sample_fraction: f64,
    /// Cardinality limit of binned columns
    pub bin_limit: usize,
    /// Pseudo random seed
    pub seed: u64,
    /// Per-class weights handed to the tree grower (empty = uniform)
    pub class_weights: Vec<f64>,
    /// Number of columns tried at each split; `None` picks `sqrt(columns)`
    pub features: Option<usize>,
    /// Build trees in parallel on each node
    pub parallel_trees: bool,
    /// Rebalance classes across the cluster
    pub stratify: bool,
    /// Per-class quota overrides, only used with `stratify`
    pub strata: Vec<StratumOverride>,
    /// Also consider one-vs-rest exclusion splits during split search
    pub exclusion_splits: bool,
    /// Worker threads per node (0 = all cores)
    pub num_threads: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            num_trees: DEFAULT_NUM_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            statistic: DEFAULT_STAT_TYPE,
            class_column: 0,
            ignored_columns: Vec::new(),
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
            bin_limit: DEFAULT_BIN_LIMIT,
            seed: DEFAULT_RANDOM_SEED,
            class_weights: Vec::new(),
            features: None,
            parallel_trees: true,
            stratify: false,
            strata: Vec::new(),
            exclusion_splits: false,
            num_threads: DEFAULT_NUM_THREADS,
        }
    }
}

impl ForestConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(DrfError::invalid_parameter(
                "num_trees",
                self.num_trees.to_string(),
                "must be at least 1",
            ));
        }

        if self.max_depth == 0 {
            return Err(DrfError::invalid_parameter(
                "max_depth",
                self.max_depth.to_string(),
                "must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.sample_fraction) {
            return Err(DrfError::invalid_parameter(
                "sample_fraction",
                self.sample_fraction.to_string(),
                "must be in range [0.0, 1.0]",
            ));
        }

        if self.bin_limit == 0 || self.bin_limit > MAX_BIN_LIMIT {
            return Err(DrfError::invalid_parameter(
                "bin_limit",
                self.bin_limit.to_string(),
                format!("must be in range [1, {}]", MAX_BIN_LIMIT),
            ));
        }

        if self.ignored_columns.contains(&self.class_column) {
            return Err(DrfError::invalid_parameter(
                "ignored_columns",
                format!("{:?}", self.ignored_columns),
                "must not contain the class column",
            ));
        }

        if let Some(features) = self.features {
            if features == 0 {
                return Err(DrfError::invalid_parameter(
                    "features",
                    "0",
                    "must be at least 1",
                ));
            }
        }

        for (i, &w) in self.class_weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(DrfError::invalid_parameter(
                    format!("class_weights[{}]", i),
                    w.to_string(),
                    "must be a finite non-negative number",
                ));
            }
        }

        if !self.strata.is_empty() && !self.stratify {
            log::warn!("strata overrides are ignored because stratify is disabled");
        }

        Ok(())
    }

    /// Sorted, de-duplicated ignored columns.
    pub fn sorted_ignores(&self) -> Vec<ColumnIndex> {
        let mut ignores = self.ignored_columns.clone();
        ignores.sort_unstable();
        ignores.dedup();
        ignores
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: ForestConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(DrfError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.json` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| DrfError::config(format!("Failed to serialize to TOML: {}", e)))?,
            _ => {
                return Err(DrfError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Builder for [`ForestConfig`]
#[derive(Debug, Default)]
pub struct ForestConfigBuilder {
    config: ForestConfig,
}

impl ForestConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of trees
    pub fn num_trees(mut self, num_trees: usize) -> Self {
        self.config.num_trees = num_trees;
        self
    }

    /// Set the maximum tree depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Set the split statistic
    pub fn statistic(mut self, statistic: StatType) -> Self {
        self.config.statistic = statistic;
        self
    }

    /// Set the class column
    pub fn class_column(mut self, column: ColumnIndex) -> Self {
        self.config.class_column = column;
        self
    }

    /// Set the ignored columns
    pub fn ignored_columns(mut self, columns: Vec<ColumnIndex>) -> Self {
        self.config.ignored_columns = columns;
        self
    }

    /// Set the sample fraction
    pub fn sample_fraction(mut self, fraction: f64) -> Self {
        self.config.sample_fraction = fraction;
        self
    }

    /// Set the bin cardinality limit
    pub fn bin_limit(mut self, limit: usize) -> Self {
        self.config.bin_limit = limit;
        self
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the per-class weights
    pub fn class_weights(mut self, weights: Vec<f64>) -> Self {
        self.config.class_weights = weights;
        self
    }

    /// Set the number of columns tried per split
    pub fn features(mut self, features: usize) -> Self {
        self.config.features = Some(features);
        self
    }

    /// Build trees in parallel
    pub fn parallel_trees(mut self, parallel: bool) -> Self {
        self.config.parallel_trees = parallel;
        self
    }

    /// Enable stratified sampling
    pub fn stratify(mut self, stratify: bool) -> Self {
        self.config.stratify = stratify;
        self
    }

    /// Add a per-class quota override
    pub fn stratum(mut self, class: i64, rows: usize) -> Self {
        self.config.strata.push(StratumOverride { class, rows });
        self
    }

    /// Consider exclusion splits
    pub fn exclusion_splits(mut self, enabled: bool) -> Self {
        self.config.exclusion_splits = enabled;
        self
    }

    /// Set the worker thread count
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ForestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> ForestConfig {
        self.config
    }
}
