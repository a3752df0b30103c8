use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api::AppState;
use crate::error::ApiError;

/// GET /health - storage liveness, served without authentication
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.routes.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "response": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "response": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}

/// GET /info - authenticated ping
pub async fn info() -> StatusCode {
    StatusCode::OK
}

pub async fn no_route() -> ApiError {
    ApiError::not_found("Invalid method path")
}
