use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::vector_record::VectorRecord,
        vector_store::{IndexTarget, VectorStore},
    },
    utils::embedding::EmbeddingProvider,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    chunking::split_into_chunks,
    config::{IngestionConfig, IngestionTuning},
    progress::{progress_channel, ProgressEvent, ProgressReceiver},
    services::{DefaultPipelineServices, PipelineServices},
    IngestionPipeline,
};
use crate::types::Document;

const TEST_DIMENSION: usize = 8;

struct MockServices {
    calls: Mutex<Vec<&'static str>>,
    upserted: Mutex<Vec<VectorRecord>>,
}

impl MockServices {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            upserted: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, call: &'static str) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PipelineServices for MockServices {
    async fn prepare_target(&self, _target: &IndexTarget) -> Result<(), AppError> {
        self.record("prepare_target").await;
        Ok(())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.record("embed").await;
        Ok(vec![vec![0.1; TEST_DIMENSION]; texts.len()])
    }

    async fn upsert_batch(
        &self,
        _target: &IndexTarget,
        records: Vec<VectorRecord>,
    ) -> Result<(), AppError> {
        self.record("upsert").await;
        self.upserted.lock().await.extend(records);
        Ok(())
    }
}

struct FailingEmbedServices;

#[async_trait]
impl PipelineServices for FailingEmbedServices {
    async fn prepare_target(&self, _target: &IndexTarget) -> Result<(), AppError> {
        Ok(())
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        Err(AppError::Processing("mock embedding failure".to_string()))
    }

    async fn upsert_batch(
        &self,
        _target: &IndexTarget,
        _records: Vec<VectorRecord>,
    ) -> Result<(), AppError> {
        unreachable!("upsert_batch should not be called when embedding fails")
    }
}

struct FailAfterFirstUpsert {
    inner: DefaultPipelineServices,
    upserts: Mutex<usize>,
}

#[async_trait]
impl PipelineServices for FailAfterFirstUpsert {
    async fn prepare_target(&self, target: &IndexTarget) -> Result<(), AppError> {
        self.inner.prepare_target(target).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.inner.embed_batch(texts).await
    }

    async fn upsert_batch(
        &self,
        target: &IndexTarget,
        records: Vec<VectorRecord>,
    ) -> Result<(), AppError> {
        let mut upserts = self.upserts.lock().await;
        if *upserts >= 1 {
            return Err(AppError::Processing("mock upsert failure".to_string()));
        }
        *upserts += 1;
        self.inner.upsert_batch(target, records).await
    }
}

async fn setup_store() -> VectorStore {
    let namespace = "pipeline_test";
    let database = Uuid::new_v4().to_string();
    let db = SurrealDbClient::memory(namespace, &database)
        .await
        .expect("Failed to start in-memory surrealdb");
    VectorStore::new(Arc::new(db))
}

/// Four-character chunks with no overlap so chunk counts are exact, ten
/// chunks per batch.
fn four_char_config() -> IngestionConfig {
    IngestionConfig {
        tuning: IngestionTuning {
            chunk_min_chars: 4,
            chunk_max_chars: 4,
            chunk_overlap_chars: 0,
            batch_size: 10,
        },
    }
}

fn target() -> IndexTarget {
    IndexTarget::new("docs", "main").expect("target")
}

async fn collect_events(mut rx: ProgressReceiver) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn run_emits_batch_frames_then_a_single_completed_frame() {
    let services = Arc::new(MockServices::new());
    let pipeline = IngestionPipeline::with_services(four_char_config(), services.clone());
    let documents = vec![Document::new("a".repeat(100), "doc.txt")];

    let (sender, rx) = progress_channel();
    pipeline
        .run(target(), documents, sender)
        .await
        .expect("run succeeds");

    let events = collect_events(rx).await;
    assert_eq!(events.len(), 4, "three batch frames plus one terminal");

    let upserted: Vec<usize> = events[..3].iter().map(|e| e.chunks_upserted).collect();
    assert_eq!(upserted, vec![10, 20, 25]);

    for event in &events[..3] {
        assert_eq!(event.file_name, "doc");
        assert_eq!(event.total_chunks, 25);
        assert!(!event.is_completed);
        assert!(event.error.is_none());
    }

    let progress: Vec<f64> = events[..3]
        .iter()
        .map(|e| e.progress.expect("batch frames carry progress"))
        .collect();
    assert_eq!(progress, vec![40.0, 80.0, 100.0]);

    let last = &events[3];
    assert!(last.is_completed);
    assert_eq!(last.file_name, "doc");
    assert_eq!(last.total_chunks, 25);
    assert_eq!(last.chunks_upserted, 25);
    assert!(last.progress.is_none());
    assert!(last.error.is_none());

    let call_log = services.calls.lock().await.clone();
    assert_eq!(
        call_log,
        [
            "prepare_target",
            "embed",
            "upsert",
            "embed",
            "upsert",
            "embed",
            "upsert"
        ]
    );
}

#[tokio::test]
async fn a_run_with_no_documents_reports_an_empty_completed_frame() {
    let services = Arc::new(MockServices::new());
    let pipeline = IngestionPipeline::with_services(four_char_config(), services.clone());

    let (sender, rx) = progress_channel();
    pipeline
        .run(target(), Vec::new(), sender)
        .await
        .expect("run succeeds");

    let events = collect_events(rx).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_completed);
    assert_eq!(events[0].file_name, "");
    assert_eq!(events[0].total_chunks, 0);
    assert_eq!(events[0].chunks_upserted, 0);

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log, ["prepare_target"]);
}

#[tokio::test]
async fn an_empty_document_contributes_no_chunks() {
    let services = Arc::new(MockServices::new());
    let pipeline = IngestionPipeline::with_services(four_char_config(), services.clone());
    let documents = vec![Document::new("", "empty.txt")];

    let (sender, rx) = progress_channel();
    pipeline
        .run(target(), documents, sender)
        .await
        .expect("run succeeds");

    let events = collect_events(rx).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_completed);
    assert_eq!(events[0].file_name, "empty");
    assert_eq!(events[0].total_chunks, 0);
    assert_eq!(events[0].chunks_upserted, 0);

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log, ["prepare_target"], "nothing to embed or upsert");
}

#[tokio::test]
async fn chunks_upserted_grows_monotonically_across_documents() {
    let services = Arc::new(MockServices::new());
    let pipeline = IngestionPipeline::with_services(four_char_config(), services.clone());
    let documents = vec![
        Document::new("a".repeat(48), "first.txt"),
        Document::new("b".repeat(20), "second.txt"),
    ];

    let (sender, rx) = progress_channel();
    pipeline
        .run(target(), documents, sender)
        .await
        .expect("run succeeds");

    let events = collect_events(rx).await;
    let batch_frames: Vec<&ProgressEvent> =
        events.iter().filter(|e| !e.is_completed).collect();
    assert_eq!(batch_frames.len(), 3);

    assert_eq!(batch_frames[0].file_name, "first");
    assert_eq!(batch_frames[0].chunks_upserted, 10);
    assert_eq!(batch_frames[1].file_name, "first");
    assert_eq!(batch_frames[1].chunks_upserted, 12);
    assert_eq!(batch_frames[2].file_name, "second");
    assert_eq!(batch_frames[2].chunks_upserted, 17);

    for pair in batch_frames.windows(2) {
        assert!(pair[0].chunks_upserted < pair[1].chunks_upserted);
    }
    for frame in &batch_frames {
        assert_eq!(frame.total_chunks, 17);
    }

    let last = events.last().expect("terminal frame");
    assert!(last.is_completed);
    assert_eq!(last.file_name, "second");
    assert_eq!(last.chunks_upserted, 17);

    let upserted = services.upserted.lock().await;
    assert_eq!(upserted.len(), 17);
}

#[tokio::test]
async fn run_stores_records_with_matching_embeddings_and_order() {
    let store = setup_store().await;
    let provider =
        Arc::new(EmbeddingProvider::new_hashed(TEST_DIMENSION).expect("hashed provider"));
    let services = DefaultPipelineServices::new(store.clone(), Arc::clone(&provider));
    let config = four_char_config();
    let pipeline = IngestionPipeline::with_services(config.clone(), Arc::new(services));

    let content =
        "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod tempor.";
    let documents = vec![Document::new(content, "lorem.txt")];
    let run_target = target();

    let (sender, rx) = progress_channel();
    pipeline
        .run(run_target.clone(), documents, sender)
        .await
        .expect("run succeeds");
    drop(rx);

    let chunks = split_into_chunks(&config.tuning, content).expect("chunks");
    let stored = store.fetch_records(&run_target).await.expect("fetch");
    assert_eq!(stored.len(), chunks.len());
    assert_eq!(stored[0].record_id, "lorem-1-0");

    let ids: HashSet<&str> = stored.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids.len(), stored.len(), "record ids must be unique");

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let expected = provider.embed_batch(texts).await.expect("embed");

    for ((record, chunk), embedding) in stored.iter().zip(&chunks).zip(&expected) {
        assert_eq!(record.metadata.chunk, chunk.text);
        assert_eq!(record.embedding.len(), embedding.len());
        for (value, expected_value) in record.embedding.iter().zip(embedding) {
            assert!((value - expected_value).abs() < 1e-6);
        }
    }
}

#[tokio::test]
async fn upsert_failure_emits_a_failed_frame_and_keeps_landed_batches() {
    let store = setup_store().await;
    let provider =
        Arc::new(EmbeddingProvider::new_hashed(TEST_DIMENSION).expect("hashed provider"));
    let services = Arc::new(FailAfterFirstUpsert {
        inner: DefaultPipelineServices::new(store.clone(), provider),
        upserts: Mutex::new(0),
    });
    let pipeline = IngestionPipeline::with_services(four_char_config(), services);
    let documents = vec![Document::new("a".repeat(100), "doc.txt")];
    let run_target = target();

    let (sender, rx) = progress_channel();
    let result = pipeline.run(run_target.clone(), documents, sender).await;
    assert!(matches!(result, Err(AppError::Processing(_))));

    let events = collect_events(rx).await;
    assert_eq!(events.len(), 2, "one batch frame then the failure");

    assert!(!events[0].is_completed);
    assert_eq!(events[0].chunks_upserted, 10);

    let last = &events[1];
    assert!(last.is_completed);
    assert_eq!(last.total_chunks, 25);
    assert_eq!(last.chunks_upserted, 10);
    assert!(last.progress.is_none());
    let error = last.error.as_deref().expect("failed frame carries error");
    assert!(error.contains("mock upsert failure"));

    // The first batch landed atomically before the failure.
    assert_eq!(store.count_records(&run_target).await.expect("count"), 10);
}

#[tokio::test]
async fn embedding_failure_emits_only_a_failed_frame() {
    let pipeline =
        IngestionPipeline::with_services(four_char_config(), Arc::new(FailingEmbedServices));
    let documents = vec![Document::new("a".repeat(100), "doc.txt")];

    let (sender, rx) = progress_channel();
    let result = pipeline.run(target(), documents, sender).await;
    assert!(matches!(result, Err(AppError::Processing(_))));

    let events = collect_events(rx).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_completed);
    assert_eq!(events[0].total_chunks, 25);
    assert_eq!(events[0].chunks_upserted, 0);
    let error = events[0].error.as_deref().expect("error message");
    assert!(error.contains("mock embedding failure"));
}

#[tokio::test]
async fn colliding_file_names_overwrite_rather_than_duplicate() {
    let store = setup_store().await;
    let provider =
        Arc::new(EmbeddingProvider::new_hashed(TEST_DIMENSION).expect("hashed provider"));
    let services = DefaultPipelineServices::new(store.clone(), provider);
    let pipeline = IngestionPipeline::with_services(four_char_config(), Arc::new(services));

    // Same stem, so both documents derive identical record ids.
    let documents = vec![
        Document::new("a".repeat(100), "a/report.txt"),
        Document::new("a".repeat(100), "b/report.txt"),
    ];
    let run_target = target();

    let (sender, rx) = progress_channel();
    pipeline
        .run(run_target.clone(), documents, sender)
        .await
        .expect("run succeeds");

    let events = collect_events(rx).await;
    let last = events.last().expect("terminal frame");
    assert!(last.is_completed);
    assert_eq!(last.total_chunks, 50);
    assert_eq!(last.chunks_upserted, 50);

    // The second document overwrote the first, record by record.
    assert_eq!(store.count_records(&run_target).await.expect("count"), 25);
}
