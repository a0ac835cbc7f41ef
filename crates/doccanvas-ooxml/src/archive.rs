//! Archive handling for OOXML packages
//!
//! DOCX, PPTX and XLSX files are ZIP archives containing XML parts and
//! resources. [`OoxmlArchive`] keeps every entry in its original order and
//! tracks which parts were modified. Writing raw-copies each untouched entry
//! from the source buffer (compressed bytes, compression method and header
//! fields included), so only modified parts change on disk.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use sha2::{Digest, Sha256};
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{OoxmlError, Result};

/// Main document part of a DOCX package
pub const DOCUMENT_XML: &str = "word/document.xml";

/// Relationships of the main document part
pub const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

/// Content type registry
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// One entry of the archive
#[derive(Debug, Clone)]
struct Part {
    /// Path within the archive
    name: String,
    /// Uncompressed contents
    data: Vec<u8>,
    /// Compression method of the source entry
    compression: CompressionMethod,
    /// Entry index in the source archive; `None` for appended parts
    source_index: Option<usize>,
    /// Contents differ from the source entry
    dirty: bool,
    /// Directory entry
    is_dir: bool,
}

/// An opened OOXML package borrowing its source buffer
#[derive(Debug, Clone)]
pub struct OoxmlArchive<'a> {
    /// The buffer the archive was opened from
    source: &'a [u8],
    /// Entries in original order, appended parts last
    parts: Vec<Part>,
    /// Part name to position in `parts`
    index: HashMap<String, usize>,
}

impl<'a> OoxmlArchive<'a> {
    /// Open a buffer as an OOXML package
    ///
    /// Every entry is decompressed up front, so a damaged entry is reported
    /// here rather than at write time.
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut index = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(corrupt)?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let compression = file.compression();

            let mut data = Vec::new();
            if !is_dir {
                file.read_to_end(&mut data)
                    .map_err(|e| OoxmlError::CorruptArchive(format!("{}: {}", name, e)))?;
            }

            index.insert(name.clone(), parts.len());
            parts.push(Part {
                name,
                data,
                compression,
                source_index: Some(i),
                dirty: false,
                is_dir,
            });
        }

        Ok(Self {
            source: bytes,
            parts,
            index,
        })
    }

    /// Get a part's contents by path
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| &self.parts[i])
            .filter(|p| !p.is_dir)
            .map(|p| p.data.as_slice())
    }

    /// Get a part's contents as UTF-8 text
    ///
    /// Returns `None` when the part is missing or not valid UTF-8.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Get the main document content (word/document.xml)
    pub fn document_xml(&self) -> Result<&[u8]> {
        self.get(DOCUMENT_XML)
            .ok_or_else(|| OoxmlError::DocxParse(format!("missing required part {}", DOCUMENT_XML)))
    }

    /// Check if a part exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// List all parts in archive order (directories excluded)
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|p| !p.is_dir)
            .map(|p| p.name.as_str())
    }

    /// Set or add a part's contents
    ///
    /// Writing identical bytes to an existing part does not mark it dirty.
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        let path = path.into();
        match self.index.get(&path) {
            Some(&i) => {
                let part = &mut self.parts[i];
                if part.is_dir || part.data == contents {
                    return;
                }
                part.data = contents;
                part.dirty = true;
            }
            None => {
                self.index.insert(path.clone(), self.parts.len());
                self.parts.push(Part {
                    name: path,
                    data: contents,
                    compression: CompressionMethod::Deflated,
                    source_index: None,
                    dirty: true,
                    is_dir: false,
                });
            }
        }
    }

    /// Set a part's contents from a string
    pub fn set_string(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.set(path, contents.into().into_bytes());
    }

    /// Check whether any part was modified or added
    pub fn is_modified(&self) -> bool {
        self.parts.iter().any(|p| p.dirty)
    }

    /// Names of modified or added parts, in archive order
    pub fn modified_parts(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.dirty)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Serialize the archive
    ///
    /// An unmodified archive yields the source buffer verbatim. Otherwise the
    /// source entry order is kept; clean entries are raw-copied and modified
    /// ones are re-encoded with their original compression method.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_modified() {
            return Ok(self.source.to_vec());
        }

        let mut source = ZipArchive::new(Cursor::new(self.source)).map_err(corrupt)?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));

        for part in &self.parts {
            match part.source_index {
                Some(i) if !part.dirty => {
                    let entry = source.by_index_raw(i).map_err(corrupt)?;
                    zip.raw_copy_file(entry)?;
                }
                _ => {
                    let method = match part.compression {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    };
                    let options = SimpleFileOptions::default().compression_method(method);
                    zip.start_file(part.name.as_str(), options)?;
                    zip.write_all(&part.data)?;
                }
            }
        }

        let cursor = zip.finish()?;
        log::debug!("Rewrote archive parts: {:?}", self.modified_parts());
        Ok(cursor.into_inner())
    }
}

/// SHA-256 of a buffer as lowercase hex
pub fn content_sha256(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

/// Lowercase hex encoding
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn corrupt(err: zip::result::ZipError) -> OoxmlError {
    OoxmlError::CorruptArchive(err.to_string())
}
