//! # Relay API
//!
//! 设备中继调度服务的REST API模块。
//!
//! The API is the producer side of the relay queue: it creates relays,
//! reports their state and queues cancellations. It never invokes devices;
//! that is the dispatcher's job.
//!
//! ## API 端点
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | greeting |
//! | GET | `/health` | database health |
//! | POST | `/api/relays` | create a relay (201) |
//! | GET | `/api/relays/{id}` | relay with its device |
//! | DELETE | `/api/relays/{id}` | queue a cancellation (202) |
//!
//! [`RelayClient`] speaks these endpoints for producers.
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_api::{create_app, routes::AppState};
//! use relay_infrastructure::{
//!     DatabaseManager, SqliteCancellationRepository, SqliteDeviceRepository,
//!     SqliteRelayRepository,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = Arc::new(DatabaseManager::in_memory().await?);
//! let state = AppState {
//!     relay_repo: Arc::new(SqliteRelayRepository::new(db.pool().clone())),
//!     device_repo: Arc::new(SqliteDeviceRepository::new(db.pool().clone())),
//!     cancellation_repo: Arc::new(SqliteCancellationRepository::new(db.pool().clone())),
//!     database: Some(db),
//! };
//! let app = create_app(state, std::time::Duration::from_secs(30));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

pub use client::RelayClient;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(TimeoutLayer::new(request_timeout))
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
