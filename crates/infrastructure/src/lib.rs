pub mod database;
pub mod device_api;
pub mod timeout_handler;

pub use database::{
    DatabaseManager, SqliteCancellationRepository, SqliteDeviceRepository, SqliteRelayRepository,
};
pub use device_api::{build_device_client, MockDeviceClient, ParticleClient, TimedDeviceClient};
pub use timeout_handler::TimeoutHandler;
