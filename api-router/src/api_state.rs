use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, store::StorageManager, vector_store::VectorStore},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use ingestion_pipeline::IngestionConfig;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub embedding_provider: Arc<EmbeddingProvider>,
    pub pipeline_config: IngestionConfig,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        let app_state = Self {
            db: surreal_db_client,
            config: config.clone(),
            storage,
            embedding_provider,
            pipeline_config: IngestionConfig::default(),
        };

        Ok(app_state)
    }

    /// Vector store bound to this state's database connection.
    pub fn vector_store(&self) -> VectorStore {
        VectorStore::new(Arc::clone(&self.db))
    }
}
