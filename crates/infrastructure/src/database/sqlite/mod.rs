pub mod sqlite_cancellation_repository;
pub mod sqlite_device_repository;
pub mod sqlite_relay_repository;

pub use sqlite_cancellation_repository::SqliteCancellationRepository;
pub use sqlite_device_repository::SqliteDeviceRepository;
pub use sqlite_relay_repository::SqliteRelayRepository;
