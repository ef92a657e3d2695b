use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::api_state::ApiState;

/// Liveness probe. Answers 200 as long as the process is serving requests.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Readiness probe. Round-trips a trivial query through the database and
/// reports 503 until that succeeds.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    if let Err(err) = state.db.query("RETURN true").await {
        warn!(error = %err, "readiness check failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "db": "fail" },
                "reason": err.to_string(),
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "checks": { "db": "ok" },
        })),
    )
}
