//! Workspace facade crate.
//!
//! This crate exists to expose the ingest engine and its runtime through a
//! single dependency. Host applications can depend on `ingest-workspace` and
//! enable the documented features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_ingest as ingest;

#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
