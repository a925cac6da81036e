//! # Host Bridge Traits
//!
//! Platform abstraction traits that the ingest engine depends on.
//!
//! ## Overview
//!
//! This crate defines the contract between the ingest core and the
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that a host may provide differently (desktop process,
//! workflow server plugin, test harness).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations against the repository
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file listing, reading, copying
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic version labels
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let http_client = builder.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided. \
//!                  Desktop: ensure the 'desktop-shims' feature is enabled.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and include context such as file paths or URLs.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that independent ingests can run
//! on separate tasks with shared bridge instances.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
