//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! the ingest engine needs:
//! - `HttpClient` using `reqwest`, streaming file uploads from disk
//! - `FileSystemAccess` using `tokio::fs`, with content types probed from the
//!   host's `mime.types` table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let fs = Arc::new(TokioFileSystem::new());
//!
//!     // Use in ingest configuration
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::{TokioFileSystem, DEFAULT_MIME_TYPES_PATH};
pub use http::{ReqwestHttpClient, DEFAULT_CONNECT_TIMEOUT, DIAGNOSTIC_BODY_LIMIT};
