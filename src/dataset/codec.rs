//! Per-column encoding of decoded values into compact buffer codes.
//!
//! Integer columns whose range fits the bin limit are stored *raw* as the
//! offset from the column minimum. Real-valued columns and wide integer
//! columns are *binned*: values map to the index of the smallest bin upper
//! bound that is not below them.

use crate::core::types::BinCode;
use crate::dataset::descriptor::ColumnDescriptor;
use serde::{Deserialize, Serialize};

/// How one column is written into the training buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnCodec {
    /// Excluded from training; the buffer holds 0.
    Ignored,
    /// The class column; the code is the class index.
    Class {
        /// Class column minimum
        min: i64,
        /// Number of classes
        num_classes: usize,
    },
    /// Integer offset from the column minimum.
    Raw {
        /// Column minimum
        min: i64,
        /// Number of distinct codes, `max - min + 1`
        cardinality: usize,
    },
    /// Quantized value.
    Binned {
        /// Ascending, distinct bin upper bounds
        upper_bounds: Vec<f64>,
    },
}

impl ColumnCodec {
    /// True if values of `column` must be binned under `bin_limit`.
    pub fn needs_binning(column: &ColumnDescriptor, bin_limit: usize) -> bool {
        column.is_float() || column.integer_range() > bin_limit as u64
    }

    /// Raw codec of an integer column.
    pub fn raw(column: &ColumnDescriptor) -> Self {
        ColumnCodec::Raw {
            min: column.min as i64,
            cardinality: column.integer_range() as usize,
        }
    }

    /// Binned codec built from the values observed in the selected rows.
    pub fn binned(values: Vec<f64>, bin_limit: usize) -> Self {
        ColumnCodec::Binned {
            upper_bounds: bin_upper_bounds(values, bin_limit),
        }
    }

    /// True for columns excluded from training.
    pub fn is_ignored(&self) -> bool {
        matches!(self, ColumnCodec::Ignored)
    }

    /// True for binned columns
    pub fn is_binned(&self) -> bool {
        matches!(self, ColumnCodec::Binned { .. })
    }

    /// Number of distinct codes the column can hold.
    pub fn num_bins(&self) -> usize {
        match self {
            ColumnCodec::Ignored => 1,
            ColumnCodec::Class { num_classes, .. } => *num_classes,
            ColumnCodec::Raw { cardinality, .. } => *cardinality,
            ColumnCodec::Binned { upper_bounds } => upper_bounds.len().max(1),
        }
    }

    /// Code of the value of `column` in `row`. The row must have passed the
    /// validity check for this column.
    pub fn encode(&self, column: &ColumnDescriptor, row: &[u8]) -> BinCode {
        match self {
            ColumnCodec::Ignored => 0,
            ColumnCodec::Class { min, .. } | ColumnCodec::Raw { min, .. } => column
                .int_value(row)
                .map(|v| (v - min) as BinCode)
                .unwrap_or(0),
            ColumnCodec::Binned { .. } => column.value(row).map(|v| self.quantize(v)).unwrap_or(0),
        }
    }

    /// Bin of a real value. Values above the last bound land in the last bin.
    pub fn quantize(&self, value: f64) -> BinCode {
        match self {
            ColumnCodec::Binned { upper_bounds } if !upper_bounds.is_empty() => {
                let idx = upper_bounds.partition_point(|b| *b < value);
                idx.min(upper_bounds.len() - 1) as BinCode
            }
            _ => 0,
        }
    }
}

/// Bin upper bounds for `values`: the distinct values themselves when there
/// are at most `bin_limit` of them, otherwise `bin_limit` evenly spaced
/// quantiles with duplicates removed.
pub fn bin_upper_bounds(mut values: Vec<f64>, bin_limit: usize) -> Vec<f64> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() || bin_limit == 0 {
        return Vec::new();
    }
    values.sort_by(f64::total_cmp);

    let mut distinct = values.clone();
    distinct.dedup();
    if distinct.len() <= bin_limit {
        return distinct;
    }

    let n = values.len();
    let mut bounds: Vec<f64> = (1..=bin_limit)
        .map(|i| {
            let q = i as f64 / bin_limit as f64;
            let idx = ((n - 1) as f64 * q).round() as usize;
            values[idx.min(n - 1)]
        })
        .collect();
    bounds.dedup();
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(width: i8, min: f64, max: f64) -> ColumnDescriptor {
        ColumnDescriptor {
            name: "x".to_string(),
            offset: 0,
            width,
            base: 0,
            scale: 1,
            min,
            max,
        }
    }

    #[test]
    fn test_needs_binning() {
        assert!(!ColumnCodec::needs_binning(&column(1, 0.0, 9.0), 10));
        assert!(ColumnCodec::needs_binning(&column(1, 0.0, 10.0), 10));
        assert!(ColumnCodec::needs_binning(&column(-8, 0.0, 1.0), 1024));
    }

    #[test]
    fn test_raw_encoding_is_offset_from_min() {
        let c = column(1, 3.0, 9.0);
        let codec = ColumnCodec::raw(&c);
        assert_eq!(codec.num_bins(), 7);
        assert_eq!(codec.encode(&c, &[3u8]), 0);
        assert_eq!(codec.encode(&c, &[9u8]), 6);
    }

    #[test]
    fn test_few_distinct_values_get_one_bin_each() {
        let codec = ColumnCodec::binned(vec![0.5, 2.5, 0.5, 1.5], 8);
        assert_eq!(codec.num_bins(), 3);
        assert_eq!(codec.quantize(0.5), 0);
        assert_eq!(codec.quantize(1.5), 1);
        assert_eq!(codec.quantize(2.5), 2);
    }

    #[test]
    fn test_quantile_bounds_respect_limit() {
        let values: Vec<f64> = (0..1000).map(f64::from).collect();
        let bounds = bin_upper_bounds(values, 10);
        assert_eq!(bounds.len(), 10);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*bounds.last().unwrap(), 999.0);

        let codec = ColumnCodec::Binned {
            upper_bounds: bounds,
        };
        assert_eq!(codec.quantize(0.0), 0);
        assert_eq!(codec.quantize(999.0), 9);
        assert_eq!(codec.quantize(5000.0), 9);
    }

    #[test]
    fn test_quantize_is_monotone() {
        let codec = ColumnCodec::binned((0..200).map(|v| f64::from(v) * 0.37).collect(), 16);
        let mut last = 0;
        for v in 0..200 {
            let code = codec.quantize(f64::from(v) * 0.37);
            assert!(code >= last);
            last = code;
        }
    }

    #[test]
    fn test_empty_values() {
        assert!(bin_upper_bounds(vec![], 4).is_empty());
        let codec = ColumnCodec::binned(vec![f64::NAN], 4);
        assert_eq!(codec.num_bins(), 1);
        assert_eq!(codec.quantize(1.0), 0);
    }
}
