//! Error types for the render pipeline

use thiserror::Error;

/// Result type alias for render-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering and converting a document
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create or attach an isolated rendering context
    #[error("Failed to mount isolated context: {0}")]
    MountError(String),

    /// Font resources never reported ready
    #[error("Font readiness failed: {0}")]
    FontError(String),

    /// The pagination engine failed to lay out the document
    #[error("Pagination failed: {0}")]
    PaginationError(String),

    /// The conversion engine failed to produce the binary document
    #[error("Conversion failed: {0}")]
    ConversionError(String),

    /// A cross-context message or embedded bootstrap value was unusable
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The host environment cannot create isolated rendering contexts
    #[error("Isolated contexts unsupported: {0}")]
    Unsupported(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
