//! Encoding of in-memory rows into fixed-width chunks.
//!
//! Used to load small datasets into a cluster store and by the tests.
//! Column minimum and maximum are tracked while rows are pushed, so the
//! descriptor produced by [`DatasetWriter::finish`] describes exactly the
//! values written.

use crate::cluster::{ChunkBytes, InMemoryCluster, KeyValueStore, NodeId};
use crate::core::error::{DrfError, Result};
use crate::dataset::descriptor::{ColumnDescriptor, DatasetDescriptor};
use std::sync::Arc;

/// Builder of a fixed-width dataset.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    key: String,
    rows_per_chunk: usize,
    columns: Vec<ColumnDescriptor>,
    row_size: usize,
    data: Vec<u8>,
    num_rows: u64,
    seen: Vec<bool>,
}

/// A finished dataset: its descriptor and the encoded chunk payloads.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    /// Layout of the rows
    pub descriptor: DatasetDescriptor,
    /// Chunk payloads in chunk order
    pub chunks: Vec<Vec<u8>>,
}

impl DatasetWriter {
    /// Creates a writer for dataset `key` with `rows_per_chunk` rows per chunk.
    pub fn new<S: Into<String>>(key: S, rows_per_chunk: usize) -> Self {
        DatasetWriter {
            key: key.into(),
            rows_per_chunk,
            columns: Vec::new(),
            row_size: 0,
            data: Vec::new(),
            num_rows: 0,
            seen: Vec::new(),
        }
    }

    /// Appends an integer column of `width` bytes (1, 2, 4 or 8).
    pub fn int_column<S: Into<String>>(self, name: S, width: i8) -> Self {
        self.column(name, width, 0, 1)
    }

    /// Appends a floating point column of `width` bytes (-4 or -8).
    pub fn float_column<S: Into<String>>(self, name: S, width: i8) -> Self {
        self.column(name, width, 0, 1)
    }

    /// Appends a column with explicit encoding. Fixed-point columns store
    /// `round(value * scale) - base`.
    pub fn column<S: Into<String>>(mut self, name: S, width: i8, base: i64, scale: u32) -> Self {
        let offset = self.row_size;
        self.row_size += width.unsigned_abs() as usize;
        self.columns.push(ColumnDescriptor {
            name: name.into(),
            offset,
            width,
            base,
            scale,
            min: 0.0,
            max: 0.0,
        });
        self.seen.push(false);
        self
    }

    /// Number of rows pushed so far
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Encodes one row; `None` stores the column's missing-value sentinel.
    pub fn push_row(&mut self, values: &[Option<f64>]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DrfError::dimension_mismatch(
                format!("{} values", self.columns.len()),
                format!("{} values", values.len()),
            ));
        }
        let mut row = vec![0u8; self.row_size];
        for (col, value) in self.columns.iter().zip(values) {
            encode_value(col, *value, &mut row[col.offset..col.offset + col.byte_width()])?;
        }
        self.data.extend_from_slice(&row);
        for (i, (col, value)) in self.columns.iter_mut().zip(values).enumerate() {
            if let Some(v) = *value {
                if self.seen[i] {
                    col.min = col.min.min(v);
                    col.max = col.max.max(v);
                } else {
                    col.min = v;
                    col.max = v;
                    self.seen[i] = true;
                }
            }
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Splits the rows into chunks and returns them with their descriptor.
    pub fn finish(self) -> Result<EncodedDataset> {
        let descriptor = DatasetDescriptor {
            key: self.key,
            columns: self.columns,
            row_size: self.row_size,
            num_rows: self.num_rows,
            rows_per_chunk: self.rows_per_chunk,
        };
        descriptor.validate_layout()?;
        let chunks = self
            .data
            .chunks(descriptor.chunk_bytes())
            .map(|c| c.to_vec())
            .collect();
        Ok(EncodedDataset { descriptor, chunks })
    }
}

impl EncodedDataset {
    /// Stores every chunk, letting the store pick each home node.
    pub fn store(&self, store: &dyn KeyValueStore) {
        for (i, chunk) in self.chunks.iter().enumerate() {
            let bytes: ChunkBytes = Arc::from(chunk.as_slice());
            store.put(self.descriptor.chunk_key(i), bytes);
        }
        store.write_barrier();
    }

    /// Stores every chunk on the node chosen by `placement(chunk_index)`.
    pub fn distribute<F>(&self, cluster: &InMemoryCluster, placement: F)
    where
        F: Fn(usize) -> NodeId,
    {
        for (i, chunk) in self.chunks.iter().enumerate() {
            let bytes: ChunkBytes = Arc::from(chunk.as_slice());
            cluster.put_on(placement(i), self.descriptor.chunk_key(i), bytes);
        }
        cluster.write_barrier();
    }
}

fn encode_value(col: &ColumnDescriptor, value: Option<f64>, out: &mut [u8]) -> Result<()> {
    match col.width {
        -4 => out.copy_from_slice(&(value.unwrap_or(f64::NAN) as f32).to_le_bytes()),
        -8 => out.copy_from_slice(&value.unwrap_or(f64::NAN).to_le_bytes()),
        width => {
            let stored = match value {
                Some(v) => (v * f64::from(col.scale)).round() as i64 - col.base,
                None => i64::MIN,
            };
            match width {
                1 => {
                    let b = if value.is_none() {
                        u8::MAX
                    } else {
                        u8::try_from(stored)
                            .ok()
                            .filter(|b| *b != u8::MAX)
                            .ok_or_else(|| out_of_range(col, stored))?
                    };
                    out[0] = b;
                }
                2 => {
                    let v = if value.is_none() {
                        i16::MIN
                    } else {
                        i16::try_from(stored)
                            .ok()
                            .filter(|v| *v != i16::MIN)
                            .ok_or_else(|| out_of_range(col, stored))?
                    };
                    out.copy_from_slice(&v.to_le_bytes());
                }
                4 => {
                    let v = if value.is_none() {
                        i32::MIN
                    } else {
                        i32::try_from(stored)
                            .ok()
                            .filter(|v| *v != i32::MIN)
                            .ok_or_else(|| out_of_range(col, stored))?
                    };
                    out.copy_from_slice(&v.to_le_bytes());
                }
                8 => {
                    if value.is_some() && stored == i64::MIN {
                        return Err(out_of_range(col, stored));
                    }
                    out.copy_from_slice(&stored.to_le_bytes());
                }
                other => {
                    return Err(DrfError::dataset(format!(
                        "column {} has unsupported width {}",
                        col.name, other
                    )))
                }
            }
        }
    }
    Ok(())
}

fn out_of_range(col: &ColumnDescriptor, stored: i64) -> DrfError {
    DrfError::invalid_parameter(
        col.name.clone(),
        stored.to_string(),
        format!("does not fit in {} bytes", col.byte_width()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_tracks_range_and_chunks() {
        let mut w = DatasetWriter::new("w.hex", 2)
            .int_column("a", 1)
            .float_column("b", -8);
        w.push_row(&[Some(3.0), Some(0.5)]).unwrap();
        w.push_row(&[Some(1.0), None]).unwrap();
        w.push_row(&[None, Some(-2.0)]).unwrap();
        let ds = w.finish().unwrap();

        let d = &ds.descriptor;
        assert_eq!(d.row_size, 9);
        assert_eq!(d.num_chunks(), 2);
        assert_eq!(ds.chunks.len(), 2);
        assert_eq!(d.columns[0].min, 1.0);
        assert_eq!(d.columns[0].max, 3.0);
        assert_eq!(d.columns[1].min, -2.0);

        let row = d.row(&ds.chunks[0], 1);
        assert_eq!(d.columns[0].int_value(row), Some(1));
        assert_eq!(d.columns[1].value(row), None);
        let row = d.row(&ds.chunks[1], 0);
        assert_eq!(d.columns[0].value(row), None);
    }

    #[test]
    fn test_fixed_point_encoding() {
        let mut w = DatasetWriter::new("fp.hex", 8).column("x", 2, 10, 100);
        w.push_row(&[Some(1.25)]).unwrap();
        let ds = w.finish().unwrap();
        let row = ds.descriptor.row(&ds.chunks[0], 0);
        assert_eq!(ds.descriptor.columns[0].value(row), Some(1.25));
    }

    #[test]
    fn test_value_overflow_is_rejected() {
        let mut w = DatasetWriter::new("o.hex", 8).int_column("x", 1);
        assert!(w.push_row(&[Some(300.0)]).is_err());
        assert!(w.push_row(&[Some(1.0), Some(2.0)]).is_err());
    }

    #[test]
    fn test_distribute_places_chunks() {
        let mut w = DatasetWriter::new("p.hex", 1).int_column("x", 1);
        for v in 0..4 {
            w.push_row(&[Some(f64::from(v))]).unwrap();
        }
        let ds = w.finish().unwrap();
        let cluster = InMemoryCluster::new(2);
        ds.distribute(&cluster, |i| NodeId((i % 2) as u16));
        assert_eq!(cluster.resolve_home(&ds.descriptor.chunk_key(3)), NodeId(1));
        assert!(cluster.get(&ds.descriptor.chunk_key(0)).is_some());
    }
}
