//! System constants and default configuration values for DRF Rust.

use crate::core::types::StatType;
use static_assertions::const_assert;

/// Smallest number of classes a classification run accepts.
pub const MIN_CLASSES: usize = 2;

/// Largest number of classes a classification run accepts.
/// Class codes are stored as `u16` in the training buffer.
pub const MAX_CLASSES: usize = 65534;

/// Largest cardinality a binned column may have.
pub const MAX_BIN_LIMIT: usize = 65534;

const_assert!(MAX_CLASSES < u16::MAX as usize);
const_assert!(MAX_BIN_LIMIT < u16::MAX as usize);

/// Default cardinality limit for binned columns.
pub const DEFAULT_BIN_LIMIT: usize = 1024;

/// Default number of trees in the forest.
pub const DEFAULT_NUM_TREES: usize = 10;

/// Default maximum tree depth (effectively unlimited).
pub const DEFAULT_MAX_DEPTH: usize = i32::MAX as usize;

/// Default proportion of observations used to build each tree.
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.67;

/// Default random seed for reproducibility.
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Default split statistic.
pub const DEFAULT_STAT_TYPE: StatType = StatType::Gini;

/// Default number of threads for parallel processing.
/// 0 means use all available cores.
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Right shift applied to the per-node majority quota to obtain the minimum
/// quota of every class.
pub const MIN_QUOTA_SHIFT: u32 = 9;

/// Chunks are `1 << LOG_CHUNK_BYTES` bytes, except possibly the last one.
pub const LOG_CHUNK_BYTES: u32 = 20;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_BYTES: usize = 1 << LOG_CHUNK_BYTES;

/// Maximum transmission unit of a single task datagram.
pub const DATAGRAM_MTU: usize = 1500;

/// Bytes reserved in a datagram for the transfer header.
pub const DATAGRAM_HEADER_BYTES: usize = 28;

/// Largest task payload that still travels as a single datagram.
pub const MAX_DATAGRAM_PAYLOAD: usize = DATAGRAM_MTU - DATAGRAM_HEADER_BYTES;

/// Attempts made for a remote task before its failure is returned.
pub const MAX_DISPATCH_ATTEMPTS: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_validity() {
        assert!(MIN_CLASSES < MAX_CLASSES);
        assert!(DEFAULT_BIN_LIMIT <= MAX_BIN_LIMIT);
        assert!(DEFAULT_SAMPLE_FRACTION > 0.0 && DEFAULT_SAMPLE_FRACTION <= 1.0);
        assert_eq!(DEFAULT_CHUNK_BYTES, 1_048_576);
        assert_eq!(MAX_DATAGRAM_PAYLOAD, 1472);
    }
}
