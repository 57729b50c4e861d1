//! Data distribution and training buffer construction.
//!
//! The pipeline, run once per training invocation:
//!
//! 1. [`HistogramBuilder`] counts classes per chunk on each node.
//! 2. [`Stratifier`] turns the merged counts into per-class row quotas.
//! 3. [`select_chunks`] picks remote chunks for classes a node is short of.
//! 4. [`TrainingBufferBuilder`] decodes, filters and encodes the selected
//!    rows into a [`DataAdapter`].

pub mod adapter;
pub mod codec;
pub mod descriptor;
pub mod histogram;
pub mod inhale;
pub mod minority;
pub mod report;
pub mod stratify;
pub mod writer;

pub use adapter::{resolve_features, DataAdapter, Row};
pub use codec::{bin_upper_bounds, ColumnCodec};
pub use descriptor::{ColumnDescriptor, DatasetDescriptor};
pub use histogram::{ChunkHistograms, HistogramBuilder};
pub use inhale::TrainingBufferBuilder;
pub use minority::{select_chunks, CandidateChunk, ChunkSelection, SelectedChunk};
pub use report::{BuildReport, BuildWarning};
pub use stratify::{round_half_up, StratificationPlan, Stratifier};
pub use writer::{DatasetWriter, EncodedDataset};
