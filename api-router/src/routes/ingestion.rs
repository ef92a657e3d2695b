use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use common::storage::vector_store::IndexTarget;
use ingestion_pipeline::{
    pipeline::progress::{progress_channel, ProgressEvent},
    utils::document_loading::load_documents,
    DefaultPipelineServices, IngestionPipeline,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    pub index_name: String,
    pub namespace: String,
}

/// Kicks off an ingestion run over every document in storage and streams its
/// progress back to the caller.
///
/// Each body chunk is one self-contained JSON frame; there is no separator
/// between frames, so callers should parse with a streaming deserializer. The
/// connection closes right after the terminal frame.
pub async fn trigger_ingestion(
    State(state): State<ApiState>,
    Json(request): Json<IngestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = IndexTarget::new(&request.index_name, &request.namespace)?;
    let documents = load_documents(&state.storage).await?;

    info!(
        index = %target.index_name(),
        namespace = %target.namespace(),
        documents = documents.len(),
        "Received ingestion request"
    );

    let services = DefaultPipelineServices::new(
        state.vector_store(),
        Arc::clone(&state.embedding_provider),
    );
    let pipeline =
        IngestionPipeline::with_services(state.pipeline_config.clone(), Arc::new(services));

    let (sender, mut receiver) = progress_channel();

    // The run outlives this handler; the channel carries its progress and the
    // terminal frame regardless of when the response finishes streaming.
    tokio::spawn(async move {
        if let Err(err) = pipeline.run(target, documents, sender).await {
            error!(error = %err, "ingestion run failed");
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = receiver.recv().await {
            yield Ok::<Bytes, Infallible>(frame_bytes(&event));
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );

    Ok((headers, Body::from_stream(stream)))
}

fn frame_bytes(event: &ProgressEvent) -> Bytes {
    match serde_json::to_vec(event) {
        Ok(bytes) => Bytes::from(bytes),
        Err(err) => {
            error!(error = %err, "failed to serialize progress event");
            Bytes::new()
        }
    }
}
