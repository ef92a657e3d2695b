use std::path::Path;

use serde::{Deserialize, Serialize};

/// A document pulled from storage, ready to be chunked and embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Full text of the document.
    pub content: String,
    /// Path of the document inside the storage backend, e.g. `notes/todo.md`.
    pub source_path: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
        }
    }

    /// Base name without directories or the final extension, used as the
    /// file component of record IDs and progress frames.
    ///
    /// Two documents whose paths differ only in directory or extension share
    /// a file name, so their records overwrite each other on upsert.
    pub fn file_name(&self) -> String {
        Path::new(&self.source_path)
            .file_stem()
            .map_or_else(|| self.source_path.clone(), |stem| stem.to_string_lossy().into_owned())
    }
}
