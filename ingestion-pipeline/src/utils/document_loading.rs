use common::{error::AppError, storage::store::StorageManager};
use tracing::warn;

use super::pdf_extraction::extract_pdf_text;
use crate::types::Document;

/// Loads every document in storage that the pipeline can turn into text.
///
/// Unsupported types are skipped with a warning rather than failing the run,
/// so one stray binary in the documents directory does not block ingestion.
pub async fn load_documents(storage: &StorageManager) -> Result<Vec<Document>, AppError> {
    let names = storage.list_file_names().await?;

    let mut documents = Vec::with_capacity(names.len());

    for name in names {
        match load_document(storage, &name).await? {
            Some(document) => documents.push(document),
            None => {
                warn!(file = %name, "skipping unsupported document type");
            }
        }
    }

    Ok(documents)
}

/// Reads one document and extracts its text, dispatching on the MIME type
/// guessed from the file name. Returns `Ok(None)` for unsupported types.
async fn load_document(
    storage: &StorageManager,
    name: &str,
) -> Result<Option<Document>, AppError> {
    let mime_type = mime_guess::from_path(name)
        .first_or(mime::APPLICATION_OCTET_STREAM)
        .to_string();

    match mime_type.as_str() {
        "text/plain" | "text/markdown" => {
            let bytes = storage.get(name).await?;
            let content = String::from_utf8(bytes.to_vec()).map_err(|_| {
                AppError::Processing(format!("document '{name}' is not valid UTF-8"))
            })?;
            Ok(Some(Document::new(content, name)))
        }
        "application/pdf" => {
            let bytes = storage.get(name).await?;
            let content = extract_pdf_text(bytes.to_vec()).await?;
            Ok(Some(Document::new(content, name)))
        }
        _ => Ok(None),
    }
}
