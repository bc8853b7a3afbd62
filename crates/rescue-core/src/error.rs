//! Error types for core operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The summarizer payload violated its contract (for example, an
    /// annotations entry that is not an object). Not recoverable.
    #[error("Structural payload error: {0}")]
    StructuralPayload(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
