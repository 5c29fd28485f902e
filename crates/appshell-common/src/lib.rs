//! # AppShell Common
//!
//! Shared logging configuration and setup for the AppShell offline cache
//! engine.
//!
//! ## Features
//!
//! - Logging configuration with env-filter overrides
//! - Pretty, compact, and JSON output formats
//! - Re-initialization-safe setup for test harnesses

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LoggingError};
