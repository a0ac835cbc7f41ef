//! Error types for PDF conversion

use std::time::Duration;

use thiserror::Error;

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Errors that can occur during PDF conversion
#[derive(Error, Debug)]
pub enum PdfError {
    /// The converter could not be started, or the work directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The converter was killed after running too long
    #[error("converter did not finish within {0:?}")]
    Timeout(Duration),

    /// The converter exited unsuccessfully
    #[error("converter exited with {0}")]
    ConverterFailed(String),

    /// The converter succeeded but wrote no PDF
    #[error("converter produced no PDF")]
    MissingOutput,
}
