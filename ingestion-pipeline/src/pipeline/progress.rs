use common::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress frames are buffered here while the transport catches up. Runs are
/// small enough that a full buffer just means a slow consumer.
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// One self-contained progress frame. Serialized as-is onto the wire, so the
/// field names here are the streaming contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// File the frame refers to; empty when a run with no documents finishes
    pub file_name: String,
    /// Total chunks across all documents in the run
    pub total_chunks: usize,
    /// Chunks durably upserted so far; never decreases within a run
    pub chunks_upserted: usize,
    /// True only on the single terminal frame
    pub is_completed: bool,
    /// Percent complete, only present on batch frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Failure description, only present on a failed terminal frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn batch(file_name: &str, total_chunks: usize, chunks_upserted: usize) -> Self {
        Self {
            file_name: file_name.to_owned(),
            total_chunks,
            chunks_upserted,
            is_completed: false,
            progress: Some(progress_percent(chunks_upserted, total_chunks)),
            error: None,
        }
    }

    pub fn completed(file_name: &str, total_chunks: usize, chunks_upserted: usize) -> Self {
        Self {
            file_name: file_name.to_owned(),
            total_chunks,
            chunks_upserted,
            is_completed: true,
            progress: None,
            error: None,
        }
    }

    pub fn failed(
        file_name: &str,
        total_chunks: usize,
        chunks_upserted: usize,
        error: &AppError,
    ) -> Self {
        Self {
            file_name: file_name.to_owned(),
            total_chunks,
            chunks_upserted,
            is_completed: true,
            progress: None,
            error: Some(error.to_string()),
        }
    }
}

/// Percent of chunks upserted. A run with nothing to do reports 0.0 rather
/// than dividing by zero.
pub fn progress_percent(chunks_upserted: usize, total_chunks: usize) -> f64 {
    if total_chunks == 0 {
        return 0.0;
    }
    (chunks_upserted as f64 / total_chunks as f64) * 100.0
}

/// Producer half of a run's progress stream. Batch frames borrow the sender;
/// the terminal frames consume it, so a run cannot emit two terminal events
/// or keep reporting after one.
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

/// Consumer half, handed to whichever transport forwards the frames.
pub type ProgressReceiver = mpsc::Receiver<ProgressEvent>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    (ProgressSender { tx }, rx)
}

impl ProgressSender {
    /// Reports one durably upserted batch. A dropped receiver just means the
    /// client went away; the run carries on.
    pub async fn batch(&self, file_name: &str, total_chunks: usize, chunks_upserted: usize) {
        let _ = self
            .tx
            .send(ProgressEvent::batch(file_name, total_chunks, chunks_upserted))
            .await;
    }

    pub async fn completed(self, file_name: &str, total_chunks: usize, chunks_upserted: usize) {
        let _ = self
            .tx
            .send(ProgressEvent::completed(
                file_name,
                total_chunks,
                chunks_upserted,
            ))
            .await;
    }

    pub async fn failed(
        self,
        file_name: &str,
        total_chunks: usize,
        chunks_upserted: usize,
        error: &AppError,
    ) {
        let _ = self
            .tx
            .send(ProgressEvent::failed(
                file_name,
                total_chunks,
                chunks_upserted,
                error,
            ))
            .await;
    }
}
