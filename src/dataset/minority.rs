//! Chunk selection for under-represented classes.
//!
//! A node short of rows of some class first counts what its own chunks hold,
//! then draws random chunks homed elsewhere that contain the class until the
//! quota is covered or no candidates are left.

use crate::cluster::{ChunkBytes, ChunkKey};
use crate::core::types::{ClassIndex, RowCount};
use crate::core::utils::random::Random;
use serde::{Deserialize, Serialize};

/// A chunk holding rows of the class being selected for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateChunk {
    /// Chunk address
    pub key: ChunkKey,
    /// Rows of the class in the chunk
    pub rows: RowCount,
}

/// A chunk picked for a class, with its payload when it was fetched remotely.
#[derive(Debug, Clone)]
pub struct SelectedChunk {
    /// Chunk address
    pub key: ChunkKey,
    /// Rows of the class in the chunk
    pub rows: RowCount,
    /// Payload of a remote chunk; `None` for home chunks
    pub payload: Option<ChunkBytes>,
}

impl SelectedChunk {
    /// True if the chunk is homed on the selecting node.
    pub fn is_home(&self) -> bool {
        self.payload.is_none()
    }
}

/// Outcome of selecting chunks for one class.
#[derive(Debug, Clone)]
pub struct ChunkSelection {
    /// Class selected for
    pub class: ClassIndex,
    /// Home chunks first, then remote chunks in draw order
    pub chunks: Vec<SelectedChunk>,
    /// Rows of the class the selected chunks hold
    pub rows_covered: RowCount,
    /// Remote chunks that could not be fetched
    pub unavailable: Vec<ChunkKey>,
}

impl ChunkSelection {
    /// The remotely fetched chunks
    pub fn remote(&self) -> impl Iterator<Item = &SelectedChunk> {
        self.chunks.iter().filter(|c| !c.is_home())
    }
}

/// Selects chunks covering `quota_rows` rows of `class`.
///
/// All `home` chunks are taken. If they number fewer than
/// `1 + quota_rows / rows_per_chunk` and hold fewer than `quota_rows` rows,
/// chunks are drawn without replacement from `remote` and fetched one at a
/// time. A chunk `fetch` cannot return is recorded as unavailable and the
/// draw continues. A shortfall is not an error; the caller compares
/// `rows_covered` with the quota.
pub fn select_chunks<F>(
    class: ClassIndex,
    quota_rows: RowCount,
    rows_per_chunk: usize,
    home: &[CandidateChunk],
    remote: &[CandidateChunk],
    rng: &mut Random,
    mut fetch: F,
) -> ChunkSelection
where
    F: FnMut(&ChunkKey) -> Option<ChunkBytes>,
{
    let mut selection = ChunkSelection {
        class,
        chunks: Vec::with_capacity(home.len()),
        rows_covered: 0,
        unavailable: Vec::new(),
    };
    for c in home {
        selection.rows_covered += c.rows;
        selection.chunks.push(SelectedChunk {
            key: c.key.clone(),
            rows: c.rows,
            payload: None,
        });
    }

    let estimated_chunks = 1 + quota_rows / rows_per_chunk.max(1);
    if selection.chunks.len() >= estimated_chunks || selection.rows_covered >= quota_rows {
        return selection;
    }

    let mut pool: Vec<&CandidateChunk> = remote.iter().collect();
    while selection.rows_covered < quota_rows && !pool.is_empty() {
        let pick = pool.swap_remove(rng.next_index(pool.len()));
        match fetch(&pick.key) {
            Some(payload) => {
                selection.rows_covered += pick.rows;
                selection.chunks.push(SelectedChunk {
                    key: pick.key.clone(),
                    rows: pick.rows,
                    payload: Some(payload),
                });
            }
            None => {
                log::debug!("chunk {} unavailable for class {}", pick.key, class);
                selection.unavailable.push(pick.key.clone());
            }
        }
    }
    log::debug!(
        "class {}: {} chunks cover {} of {} rows",
        class,
        selection.chunks.len(),
        selection.rows_covered,
        quota_rows
    );
    selection
}
