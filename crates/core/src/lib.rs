pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{
    ApiConfig, AppConfig, DatabaseConfig, DeviceApiConfig, DeviceProvider, DispatcherConfig,
    LogFormat, ObservabilityConfig,
};
pub use errors::RelayError;
pub use models::{Cancellation, Device, NewRelay, Relay, RelayDetails, RelayStatus};
pub use traits::*;

/// 统一的Result类型
pub type RelayResult<T> = std::result::Result<T, RelayError>;
