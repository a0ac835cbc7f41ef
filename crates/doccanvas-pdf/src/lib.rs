//! doccanvas-pdf - DOCX to PDF conversion
//!
//! Conversion is delegated to a headless office suite (LibreOffice's
//! `soffice` by default). Each call runs in its own temporary directory
//! with a bounded timeout; the directory is gone by the time `convert`
//! returns.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use doccanvas_pdf::PdfConverter;
//!
//! let docx = std::fs::read("letter.docx")?;
//! let pdf = PdfConverter::new()
//!     .with_timeout(Duration::from_secs(60))
//!     .convert(&docx)?;
//! std::fs::write("letter.pdf", pdf)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod converter;
mod error;

pub use converter::{PdfConverter, DEFAULT_PROGRAM, DEFAULT_TIMEOUT};
pub use error::{PdfError, Result};

/// Convert a DOCX buffer with the default converter settings
pub fn convert_docx_to_pdf(docx: &[u8]) -> Result<Vec<u8>> {
    PdfConverter::default().convert(docx)
}
