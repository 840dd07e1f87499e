use axum::{routing::get, Router};
use std::sync::Arc;

use relay_core::traits::{CancellationRepository, DeviceRepository, RelayRepository};
use relay_infrastructure::DatabaseManager;

use crate::handlers::{
    health::{health_check, root},
    relays::{cancel_relay, create_relay, get_relay},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub relay_repo: Arc<dyn RelayRepository>,
    pub device_repo: Arc<dyn DeviceRepository>,
    pub cancellation_repo: Arc<dyn CancellationRepository>,
    /// Checked by `/health`; `None` reports the service as healthy without a store probe.
    pub database: Option<Arc<DatabaseManager>>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        // 中继管理API
        .route("/api/relays", axum::routing::post(create_relay))
        .route("/api/relays/{id}", get(get_relay).delete(cancel_relay))
        .with_state(state)
}
