//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the ingest engine:
//! - Logging and tracing infrastructure
//! - Configuration management (repository settings, ingest policy, bridges)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the engine depends on. It
//! establishes the logging conventions and the fail-fast configuration
//! builder used by every ingest.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    FileGroupRewrite, IngestConfig, IngestConfigBuilder, IngestPolicy, RepositorySettings,
};
pub use error::{Error, Result};
