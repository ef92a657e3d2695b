use common::{error::AppError, storage::vector_store::IndexTarget};
use tracing::error;

use crate::types::Document;

use super::{chunking::Chunk, config::IngestionConfig, services::PipelineServices};

/// One document's chunks, keyed by the file name derived from its path.
pub struct SplitDocument {
    pub file_name: String,
    pub chunks: Vec<Chunk>,
}

/// State for a single ingestion run. Built fresh per invocation and handed
/// through the stages; nothing in here outlives the run.
pub struct RunContext<'a> {
    pub target: IndexTarget,
    pub documents: Vec<Document>,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub splits: Vec<SplitDocument>,
    /// Denominator for every progress frame, fixed once splitting is done.
    pub total_chunks: usize,
    pub chunks_upserted: usize,
    pub current_file: Option<String>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        target: IndexTarget,
        documents: Vec<Document>,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        Self {
            target,
            documents,
            pipeline_config,
            services,
            splits: Vec::new(),
            total_chunks: 0,
            chunks_upserted: 0,
            current_file: None,
        }
    }

    /// File name for progress frames: the file currently being processed, the
    /// last one seen once the run is over, or empty for a run with no
    /// documents.
    pub fn reported_file_name(&self) -> String {
        self.current_file.clone().unwrap_or_default()
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            index = %self.target.index_name(),
            namespace = %self.target.namespace(),
            file = %self.reported_file_name(),
            chunks_upserted = self.chunks_upserted,
            total_chunks = self.total_chunks,
            error = %err,
            "ingestion run aborted"
        );
        err
    }
}
