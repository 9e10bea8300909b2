//! Standardized logging configuration for the price service binaries.
//!
//! Supports human-readable console output (default), a compact single-line
//! format, and JSON lines for log aggregation.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., `info`, `prices_worker=debug`)
//! - `LOG_FORMAT`: Output format - `pretty` (default), `compact`, or `json`
//! - `LOG_TIMESTAMPS`: Timestamp format - `local` (default), `utc`, or `none`
//! - `LOG_TARGET`: Include the module path - `true` (default) or `false`
//!
//! # Usage
//!
//! ```rust,ignore
//! use prices_common::logging::{init_logging, LogConfig};
//!
//! init_logging(LogConfig::from_env())?;
//! ```

mod config;

pub use config::{init_logging, LogConfig, LogFormat, TimestampFormat};
