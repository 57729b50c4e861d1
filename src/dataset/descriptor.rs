//! Dataset descriptors and fixed-width row decoding.
//!
//! A dataset is a sequence of fixed-width little-endian rows split into
//! chunks of `rows_per_chunk` rows. Each column occupies `width` bytes at
//! `offset` within a row. Positive widths (1, 2, 4, 8) hold integers,
//! negative widths (-4, -8) hold IEEE floats. Integers decode to
//! `raw + base`, divided by `scale` when the column is fixed-point.
//! The type's sentinel (`u8::MAX`, `i16::MIN`, `i32::MIN`, `i64::MIN`, NaN)
//! marks a missing value.

use crate::cluster::ChunkKey;
use crate::core::constants::{MAX_CLASSES, MIN_CLASSES};
use crate::core::error::{DrfError, Result};
use crate::core::types::{ColumnIndex, RowCount};
use serde::{Deserialize, Serialize};

/// Encoding parameters of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Byte offset within a row
    pub offset: usize,
    /// Byte width; negative for floating point
    pub width: i8,
    /// Added to the stored integer
    pub base: i64,
    /// Divisor of fixed-point integers; 1 for plain integers
    pub scale: u32,
    /// Smallest decoded value
    pub min: f64,
    /// Largest decoded value
    pub max: f64,
}

impl ColumnDescriptor {
    /// True when decoded values are real numbers rather than integers.
    pub fn is_float(&self) -> bool {
        self.width < 0 || self.scale != 1
    }

    /// Number of bytes the column occupies in a row.
    pub fn byte_width(&self) -> usize {
        self.width.unsigned_abs() as usize
    }

    /// Number of distinct integer values in `[min, max]`.
    pub fn integer_range(&self) -> u64 {
        (self.max as i64 - self.min as i64) as u64 + 1
    }

    /// Stored integer of this column in `row`, `None` for missing or float columns.
    fn stored_int(&self, row: &[u8]) -> Option<i64> {
        let bytes = &row[self.offset..self.offset + self.byte_width()];
        match self.width {
            1 => {
                let v = bytes[0];
                (v != u8::MAX).then_some(i64::from(v))
            }
            2 => {
                let v = i16::from_le_bytes([bytes[0], bytes[1]]);
                (v != i16::MIN).then_some(i64::from(v))
            }
            4 => {
                let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (v != i32::MIN).then_some(i64::from(v))
            }
            8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                let v = i64::from_le_bytes(buf);
                (v != i64::MIN).then_some(v)
            }
            _ => None,
        }
    }

    /// Decoded value, `None` when missing.
    pub fn value(&self, row: &[u8]) -> Option<f64> {
        let bytes = &row[self.offset..self.offset + self.byte_width()];
        let v = match self.width {
            -4 => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            -8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                f64::from_le_bytes(buf)
            }
            _ => {
                let raw = self.stored_int(row)?;
                return Some((raw + self.base) as f64 / f64::from(self.scale));
            }
        };
        (!v.is_nan()).then_some(v)
    }

    /// Decoded integer value (`raw + base`), `None` when missing or the
    /// column is not an integer column.
    pub fn int_value(&self, row: &[u8]) -> Option<i64> {
        if self.is_float() {
            return None;
        }
        self.stored_int(row).map(|raw| raw + self.base)
    }

    /// True if the value is present and within `[min, max]`.
    pub fn is_valid(&self, row: &[u8]) -> bool {
        match self.value(row) {
            Some(v) => v >= self.min && v <= self.max,
            None => false,
        }
    }
}

/// Column layout and chunk geometry of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset key; chunk addresses are derived from it
    pub key: String,
    /// Columns in row order
    pub columns: Vec<ColumnDescriptor>,
    /// Bytes per row
    pub row_size: usize,
    /// Total number of rows
    pub num_rows: u64,
    /// Rows in every chunk except possibly the last
    pub rows_per_chunk: usize,
}

impl DatasetDescriptor {
    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Descriptor of column `col`
    pub fn column(&self, col: ColumnIndex) -> Result<&ColumnDescriptor> {
        self.columns
            .get(col)
            .ok_or_else(|| DrfError::index_out_of_bounds(col, self.columns.len()))
    }

    /// Bytes in a full chunk
    pub fn chunk_bytes(&self) -> usize {
        self.rows_per_chunk * self.row_size
    }

    /// Number of chunks
    pub fn num_chunks(&self) -> usize {
        if self.rows_per_chunk == 0 {
            return 0;
        }
        ((self.num_rows + self.rows_per_chunk as u64 - 1) / self.rows_per_chunk as u64) as usize
    }

    /// Address of chunk `index`
    pub fn chunk_key(&self, index: usize) -> ChunkKey {
        ChunkKey::new(self.key.clone(), (index * self.chunk_bytes()) as u64)
    }

    /// Addresses of all chunks in order
    pub fn chunk_keys(&self) -> Vec<ChunkKey> {
        (0..self.num_chunks()).map(|i| self.chunk_key(i)).collect()
    }

    /// Number of rows in a chunk payload
    pub fn rows_in(&self, payload: &[u8]) -> RowCount {
        if self.row_size == 0 {
            0
        } else {
            payload.len() / self.row_size
        }
    }

    /// Bytes of row `row` within a chunk payload
    pub fn row<'a>(&self, payload: &'a [u8], row: usize) -> &'a [u8] {
        &payload[row * self.row_size..(row + 1) * self.row_size]
    }

    /// Checks that the row layout covers every column.
    pub fn validate_layout(&self) -> Result<()> {
        if self.row_size == 0 || self.rows_per_chunk == 0 {
            return Err(DrfError::dataset("row size and rows per chunk must be positive"));
        }
        for (i, c) in self.columns.iter().enumerate() {
            if !matches!(c.width, 1 | 2 | 4 | 8 | -4 | -8) {
                return Err(DrfError::dataset(format!(
                    "column {} has unsupported width {}",
                    i, c.width
                )));
            }
            if c.scale == 0 {
                return Err(DrfError::dataset(format!("column {} has zero scale", i)));
            }
            if c.offset + c.byte_width() > self.row_size {
                return Err(DrfError::dataset(format!(
                    "column {} ends at byte {} beyond row size {}",
                    i,
                    c.offset + c.byte_width(),
                    self.row_size
                )));
            }
        }
        Ok(())
    }

    /// Number of classes of `class_column`, checking that it can drive a
    /// classification: an integer column with `2..=65534` distinct values.
    pub fn num_classes(&self, class_column: ColumnIndex) -> Result<usize> {
        let col = self.column(class_column)?;
        if col.is_float() {
            return Err(DrfError::invalid_data(
                "Floating point class column is not supported.",
            ));
        }
        let classes = col.integer_range();
        if classes < MIN_CLASSES as u64 || classes > MAX_CLASSES as u64 {
            return Err(DrfError::invalid_data(format!(
                "Number of classes must be >= {} and <= {}, found {}",
                MIN_CLASSES, MAX_CLASSES, classes
            )));
        }
        Ok(classes as usize)
    }

    /// Class index of a row, `None` when the class value is missing or out of range.
    pub fn class_of(&self, row: &[u8], class_column: ColumnIndex, num_classes: usize) -> Option<usize> {
        let col = &self.columns[class_column];
        let v = col.int_value(row)? - col.min as i64;
        (v >= 0 && (v as usize) < num_classes).then_some(v as usize)
    }
}
