use thiserror::Error;

/// Errors raised while assembling the ingest runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is missing or out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A bridge the engine cannot run without was not injected
    #[error("Missing {capability} bridge: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Cannot read settings file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// A default bridge could not be constructed
    #[error("Bridge initialization failed: {0}")]
    BridgeInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
