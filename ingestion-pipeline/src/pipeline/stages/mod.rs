use common::{error::AppError, storage::types::vector_record::VectorRecord};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument};

use super::{
    chunking::split_into_chunks,
    context::{RunContext, SplitDocument},
    progress::ProgressSender,
    state::{Done, Idle, IngestionRunMachine, Running},
};

#[instrument(
    level = "trace",
    skip_all,
    fields(
        index = %ctx.target.index_name(),
        namespace = %ctx.target.namespace(),
        documents = ctx.documents.len()
    )
)]
pub async fn split_documents(
    machine: IngestionRunMachine<(), Idle>,
    ctx: &mut RunContext<'_>,
) -> Result<IngestionRunMachine<(), Running>, AppError> {
    let documents = std::mem::take(&mut ctx.documents);

    let mut splits = Vec::with_capacity(documents.len());
    let mut total_chunks = 0;

    for document in documents {
        let file_name = document.file_name();
        let chunks = split_into_chunks(&ctx.pipeline_config.tuning, &document.content)?;

        debug!(
            file = %file_name,
            chunk_count = chunks.len(),
            "document split into chunks"
        );

        total_chunks += chunks.len();
        splits.push(SplitDocument { file_name, chunks });
    }

    info!(
        index = %ctx.target.index_name(),
        namespace = %ctx.target.namespace(),
        documents = splits.len(),
        total_chunks,
        "ingestion run input ready"
    );

    ctx.splits = splits;
    ctx.total_chunks = total_chunks;

    machine
        .start()
        .map_err(|(_, guard)| map_guard_error("start", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(
        index = %ctx.target.index_name(),
        namespace = %ctx.target.namespace(),
        total_chunks = ctx.total_chunks
    )
)]
pub async fn process_batches(
    machine: IngestionRunMachine<(), Running>,
    ctx: &mut RunContext<'_>,
    progress: &ProgressSender,
) -> Result<IngestionRunMachine<(), Done>, AppError> {
    let services = ctx.services;

    services.prepare_target(&ctx.target).await?;

    let batch_size = ctx.pipeline_config.tuning.batch_size.max(1);
    let splits = std::mem::take(&mut ctx.splits);

    for split in splits {
        ctx.current_file = Some(split.file_name.clone());

        for (position, batch) in split.chunks.chunks(batch_size).enumerate() {
            // Batch indices are 1-based in record IDs, mirroring the wire contract.
            let batch_index = position + 1;

            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = services.embed_batch(&texts).await?;

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .enumerate()
                .map(|(index, (chunk, embedding))| {
                    VectorRecord::new(
                        &split.file_name,
                        batch_index,
                        index,
                        embedding,
                        chunk.text.clone(),
                    )
                })
                .collect();
            let written = records.len();

            services.upsert_batch(&ctx.target, records).await?;

            ctx.chunks_upserted += written;
            progress
                .batch(&split.file_name, ctx.total_chunks, ctx.chunks_upserted)
                .await;

            debug!(
                file = %split.file_name,
                batch_index,
                batch_len = written,
                chunks_upserted = ctx.chunks_upserted,
                "batch embedded and upserted"
            );
        }
    }

    machine
        .finish()
        .map_err(|(_, guard)| map_guard_error("finish", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion run transition during {event}: {guard:?}"
    ))
}
