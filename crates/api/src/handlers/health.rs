use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::routes::AppState;

pub async fn root() -> &'static str {
    "Hello"
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                warn!("数据库健康检查失败: {:#}", e);
                format!("error: {e}")
            }
        },
        None => "unchecked".to_string(),
    };

    let status = if database.starts_with("error") {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status.is_success() { "ok" } else { "degraded" },
            "database": database,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "relay",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
