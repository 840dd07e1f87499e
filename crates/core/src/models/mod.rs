pub mod cancellation;
pub mod device;
pub mod relay;

pub use cancellation::Cancellation;
pub use device::Device;
pub use relay::{NewRelay, Relay, RelayDetails, RelayStatus};
