//! # Relay Testing Utils
//!
//! Shared testing utilities for the device relay dispatcher.
//!
//! - **Mock Repositories**: in-memory implementations of the store traits
//! - **Test Data Builders**: relays and devices with sensible defaults
//! - **Helpers**: polling and logging setup for async tests
//!
//! ```toml
//! [dev-dependencies]
//! relay-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
