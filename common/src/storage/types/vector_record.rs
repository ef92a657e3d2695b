use serde::{Deserialize, Serialize};

/// Metadata persisted next to each embedding so query results can be traced
/// back to their source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// The chunk text the embedding was generated from
    pub chunk: String,
    /// Source file name, without directories or extension
    pub file_name: String,
    /// 1-based batch the chunk was processed in
    pub batch_index: usize,
    /// 0-based position of the chunk within its batch
    pub index: usize,
}

/// One embedding plus its metadata, addressed by a deterministic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: VectorMetadata,
}

impl VectorRecord {
    pub fn new(
        file_name: &str,
        batch_index: usize,
        index_in_batch: usize,
        embedding: Vec<f32>,
        chunk: String,
    ) -> Self {
        Self {
            id: Self::derive_id(file_name, batch_index, index_in_batch),
            embedding,
            metadata: VectorMetadata {
                chunk,
                file_name: file_name.to_owned(),
                batch_index,
                index: index_in_batch,
            },
        }
    }

    /// Deterministic record id: `{file}-{batch}-{position}`. Re-ingesting the
    /// same file into the same namespace produces the same ids, so records are
    /// overwritten rather than duplicated.
    pub fn derive_id(file_name: &str, batch_index: usize, index_in_batch: usize) -> String {
        format!("{file_name}-{batch_index}-{index_in_batch}")
    }
}
