use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 if the search backend answers, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    if state.backend.is_ready().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "backend": "ok" }
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "backend": "fail" }
            })),
        )
    }
}
