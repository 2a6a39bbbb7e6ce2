use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health. 503 with `PARTIAL` when the store does not answer.
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, http, database) = match state.store.health_check().await {
        Ok(()) => ("OK", StatusCode::OK, json!({ "status": "OK", "message": "Connected" })),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                "PARTIAL",
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "ERROR", "message": "Database unavailable" }),
            )
        }
    };

    (
        http,
        Json(json!({
            "status": status,
            "message": "API is running",
            "timestamp": Utc::now().to_rfc3339(),
            "components": { "database": database },
        })),
    )
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
        }
    }))
}
