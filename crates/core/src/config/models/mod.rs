pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod device_api;
pub mod dispatcher;

pub use api_observability::{ApiConfig, LogFormat, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use device_api::{DeviceApiConfig, DeviceProvider};
pub use dispatcher::{DispatcherConfig, MAX_DELAY_SECONDS};
