//! Core data types for DRF Rust.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a column in the dataset descriptor.
pub type ColumnIndex = usize;

/// Class label after subtracting the class column minimum, `0..num_classes`.
pub type ClassIndex = usize;

/// Compact integer code stored in the training buffer: a raw
/// offset-from-minimum, a bin number, or a class label.
pub type BinCode = u16;

/// Row counts in histograms, quotas and chunk sizes.
pub type RowCount = usize;

/// Split statistic used to score candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    /// Gini impurity
    #[default]
    Gini,
    /// Shannon entropy in bits
    Entropy,
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatType::Gini => write!(f, "gini"),
            StatType::Entropy => write!(f, "entropy"),
        }
    }
}

impl std::str::FromStr for StatType {
    type Err = crate::core::error::DrfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(StatType::Gini),
            "entropy" => Ok(StatType::Entropy),
            other => Err(crate::core::error::DrfError::invalid_parameter(
                "statistic",
                other,
                "must be one of: gini, entropy",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_type_parse() {
        assert_eq!("gini".parse::<StatType>().unwrap(), StatType::Gini);
        assert_eq!("Entropy".parse::<StatType>().unwrap(), StatType::Entropy);
        assert!("variance".parse::<StatType>().is_err());
        assert_eq!(StatType::default().to_string(), "gini");
    }
}
