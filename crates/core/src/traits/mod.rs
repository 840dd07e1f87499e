pub mod device_client;
pub mod repository;

pub use device_client::*;
pub use repository::*;
