mod chunking;
mod config;
mod context;
pub mod progress;
mod services;
mod stages;
mod state;

pub use chunking::{split_into_chunks, Chunk};
pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::vector_store::{IndexTarget, VectorStore},
    utils::embedding::EmbeddingProvider,
};
use tracing::info;

use self::{
    context::RunContext,
    progress::ProgressSender,
    stages::{process_batches, split_documents},
    state::idle,
};
use crate::types::Document;

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(store: VectorStore, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self::with_config(store, embedding_provider, IngestionConfig::default())
    }

    pub fn with_config(
        store: VectorStore,
        embedding_provider: Arc<EmbeddingProvider>,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let services = DefaultPipelineServices::new(store, embedding_provider);

        Self::with_services(pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            pipeline_config,
            services,
        }
    }

    /// Runs one ingestion pass over `documents` and reports progress on `progress`.
    ///
    /// Exactly one terminal frame is emitted per run: `completed` once every batch
    /// has landed, `failed` otherwise. The outcome is also returned to the caller.
    #[tracing::instrument(
        skip_all,
        fields(
            index = %target.index_name(),
            namespace = %target.namespace(),
            documents = documents.len()
        )
    )]
    pub async fn run(
        &self,
        target: IndexTarget,
        documents: Vec<Document>,
        progress: ProgressSender,
    ) -> Result<(), AppError> {
        let mut ctx = RunContext::new(
            target,
            documents,
            &self.pipeline_config,
            self.services.as_ref(),
        );

        match self.drive_run(&mut ctx, &progress).await {
            Ok(()) => {
                progress
                    .completed(
                        &ctx.reported_file_name(),
                        ctx.total_chunks,
                        ctx.chunks_upserted,
                    )
                    .await;
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                progress
                    .failed(
                        &ctx.reported_file_name(),
                        ctx.total_chunks,
                        ctx.chunks_upserted,
                        &err,
                    )
                    .await;
                Err(AppError::Processing(reason))
            }
        }
    }

    async fn drive_run(
        &self,
        ctx: &mut RunContext<'_>,
        progress: &ProgressSender,
    ) -> Result<(), AppError> {
        let machine = idle();

        let run_started = Instant::now();

        let stage_start = Instant::now();
        let machine = split_documents(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let split_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = process_batches(machine, ctx, progress)
            .await
            .map_err(|err| ctx.abort(err))?;
        let process_duration = stage_start.elapsed();

        let total_duration = run_started.elapsed();
        let split_ms = Self::duration_millis(split_duration);
        let process_ms = Self::duration_millis(process_duration);
        info!(
            index = %ctx.target.index_name(),
            namespace = %ctx.target.namespace(),
            total_chunks = ctx.total_chunks,
            chunks_upserted = ctx.chunks_upserted,
            total_ms = Self::duration_millis(total_duration),
            split_ms,
            process_ms,
            "ingestion run finished"
        );

        Ok(())
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests;
