use thiserror::Error;

/// Failure inside a host bridge, as opposed to a repository answer.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request never produced a response, or the bridge itself failed
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Local file access failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
