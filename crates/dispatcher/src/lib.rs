//! Background dispatch engine
//!
//! - `selector` - fair ready-work selection
//! - `cancellation` - cancellation queue drain
//! - `processor` - per-relay liveness gate and invocation
//! - `coordinator` - the bounded-concurrency dispatch loop

pub mod cancellation;
pub mod coordinator;
pub mod processor;
pub mod selector;

pub use cancellation::CancellationDrainer;
pub use coordinator::{DispatchCoordinator, IterationReport};
pub use processor::{ProcessOutcome, RelayProcessor, RetryPolicy};
pub use selector::ReadyWorkSelector;
