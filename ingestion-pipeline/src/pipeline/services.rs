use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        types::vector_record::VectorRecord,
        vector_store::{IndexTarget, VectorStore},
    },
    utils::embedding::EmbeddingProvider,
};

/// Effectful collaborators of an ingestion run. The default implementation
/// talks to the embedding provider and the vector store; tests substitute
/// recording or failing variants.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    /// Called once per run, before the first upsert, to make sure the target
    /// index exists with the right dimension.
    async fn prepare_target(&self, target: &IndexTarget) -> Result<(), AppError>;

    /// One embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    /// Durably writes one batch of records; all of them or none.
    async fn upsert_batch(
        &self,
        target: &IndexTarget,
        records: Vec<VectorRecord>,
    ) -> Result<(), AppError>;
}

pub struct DefaultPipelineServices {
    store: VectorStore,
    embedding_provider: Arc<EmbeddingProvider>,
}

impl DefaultPipelineServices {
    pub fn new(store: VectorStore, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            store,
            embedding_provider,
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn prepare_target(&self, target: &IndexTarget) -> Result<(), AppError> {
        self.store
            .ensure_index(target, self.embedding_provider.dimension())
            .await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let embeddings = self
            .embedding_provider
            .embed_batch(texts.to_vec())
            .await
            .map_err(AppError::from)?;

        if embeddings.len() != texts.len() {
            return Err(AppError::Processing(format!(
                "embedding backend returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }

    async fn upsert_batch(
        &self,
        target: &IndexTarget,
        records: Vec<VectorRecord>,
    ) -> Result<(), AppError> {
        self.store.upsert_batch(target, records).await
    }
}
