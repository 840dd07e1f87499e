//! 配置管理
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `RELAY_` environment variable overrides. Sections are validated after
//! loading.

pub mod models;

pub use models::*;
