use core_bridge::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    /// The underlying stream rejected a write.
    #[error("output stream write failed: {0}")]
    Io(#[from] std::io::Error),
    /// Allocation failed while transcoding a chunk.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// A `Display`/`Debug` implementation returned an error.
    #[error("formatting failed")]
    Format,
}

pub type OutputResult<T> = Result<T, OutputError>;
