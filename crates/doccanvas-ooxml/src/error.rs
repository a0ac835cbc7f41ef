//! Error types for OOXML operations

use thiserror::Error;

/// Errors that can occur during OOXML operations
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// The buffer cannot be read as a ZIP container
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// The document structure is not what a DOCX requires
    #[error("DOCX parse error: {0}")]
    DocxParse(String),

    /// An export would produce, or did produce, an unsafe result
    #[error("OOXML integrity error: {0}")]
    OoxmlIntegrity(#[from] IntegrityViolation),

    /// The requested operation does not support this format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Error reading or writing bytes
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The specific reason an export was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// A changed block id is not present in the source document
    #[error("block {0} does not exist in the source document")]
    UnknownBlock(String),

    /// An asset referenced by the model has no buffer and is not embedded
    #[error("asset {0} is referenced but no buffer was supplied")]
    MissingAsset(String),

    /// Re-serialized XML is not well-formed
    #[error("patched XML in {part} is not well-formed: {reason}")]
    MalformedXml {
        /// Archive part being patched
        part: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A block present before export is gone afterwards
    #[error("block {0} is missing from the exported document")]
    BlockLost(String),

    /// An asset referenced by the model is not embedded after export
    #[error("asset {0} is not embedded in the exported document")]
    AssetNotEmbedded(String),
}

impl From<zip::result::ZipError> for OoxmlError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => OoxmlError::Io(e),
            other => OoxmlError::CorruptArchive(other.to_string()),
        }
    }
}

impl OoxmlError {
    /// Check whether this is an integrity failure
    pub fn is_integrity(&self) -> bool {
        matches!(self, OoxmlError::OoxmlIntegrity(_))
    }

    /// The integrity violation, if this is an integrity failure
    pub fn violation(&self) -> Option<&IntegrityViolation> {
        match self {
            OoxmlError::OoxmlIntegrity(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type for OOXML operations
pub type Result<T> = std::result::Result<T, OoxmlError>;
