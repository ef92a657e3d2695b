use axum::{extract::State, Json};
use common::error::AppError;

use crate::{api_state::ApiState, error::ApiError};

/// Lists the names of every file currently waiting in the documents directory.
pub async fn list_documents(State(state): State<ApiState>) -> Result<Json<Vec<String>>, ApiError> {
    let names = state
        .storage
        .list_file_names()
        .await
        .map_err(AppError::from)?;

    Ok(Json(names))
}
