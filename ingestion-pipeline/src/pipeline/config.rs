#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Smallest chunk the splitter will aim for, in characters.
    pub chunk_min_chars: usize,
    /// Hard upper bound on chunk size, in characters.
    pub chunk_max_chars: usize,
    /// Characters shared between consecutive chunks. Must stay below
    /// `chunk_min_chars`; zero means chunks tile the document exactly.
    pub chunk_overlap_chars: usize,
    /// Chunks embedded and upserted per batch.
    pub batch_size: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            chunk_min_chars: 500,
            chunk_max_chars: 2_000,
            chunk_overlap_chars: 0,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}
