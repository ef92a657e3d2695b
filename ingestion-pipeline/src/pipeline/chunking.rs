use common::error::AppError;
use text_splitter::{ChunkCapacity, ChunkConfig, TextSplitter};

use super::config::IngestionTuning;

/// A bounded slice of a document's text and its position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position within the document
    pub index: usize,
    pub text: String,
}

/// Splits text into chunks bounded by the configured character range,
/// preferring paragraph, then sentence, then word boundaries before falling
/// back to hard cuts. Splitting is pure: the same text and tuning always
/// produce the same chunks. Trimming is disabled, so with a zero overlap the
/// concatenation of the chunks reproduces the input exactly.
pub fn split_into_chunks(tuning: &IngestionTuning, text: &str) -> Result<Vec<Chunk>, AppError> {
    let min_chars = tuning.chunk_min_chars;
    let max_chars = tuning.chunk_max_chars;
    let overlap_chars = tuning.chunk_overlap_chars;

    if min_chars == 0 || max_chars == 0 || min_chars > max_chars {
        return Err(AppError::Validation(
            "invalid chunk character bounds; ensure 0 < min <= max".into(),
        ));
    }

    if overlap_chars >= min_chars {
        return Err(AppError::Validation(format!(
            "chunk_min_chars must be greater than the configured overlap of {overlap_chars}"
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_capacity = ChunkCapacity::new(min_chars)
        .with_max(max_chars)
        .map_err(|e| AppError::Validation(format!("invalid chunk character bounds: {e}")))?;
    let chunk_config = ChunkConfig::new(chunk_capacity)
        .with_overlap(overlap_chars)
        .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?
        .with_trim(false);
    let splitter = TextSplitter::new(chunk_config);

    Ok(splitter
        .chunks(text)
        .enumerate()
        .map(|(index, piece)| Chunk {
            index,
            text: piece.to_owned(),
        })
        .collect())
}
