//! Error types for the page alias library

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the page alias library
#[derive(Error, Debug)]
pub enum Error {
    /// Aliases were resolved before generation finished and counters were final
    #[error("Page aliases cannot be resolved before page generation is finished")]
    PrematureResolution,

    /// Operation not allowed in the current page or document state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Byte sequence that matches no registered alias token
    #[error("Unknown alias token: {0}")]
    UnknownAliasToken(String),

    /// The output channel already holds committed bytes
    #[error("Output already holds {0} committed bytes, can't send PDF document")]
    OutputConflict(usize),

    /// Page index outside the document
    #[error("Page not found: {0}")]
    PageNotFound(usize),

    /// Group id that was never started
    #[error("Page group not found: {0}")]
    GroupNotFound(u32),

    /// Invalid configuration or token registration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timestamp parsing error
    #[error("Invalid date expression: {0}")]
    InvalidDateExpression(String),

    /// Emitted document lacks an expected page tree entry
    #[error("Invalid PDF structure: {0}")]
    InvalidPdf(String),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
