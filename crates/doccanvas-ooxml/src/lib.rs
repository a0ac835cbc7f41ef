//! # doccanvas-ooxml
//!
//! Lossless OOXML transforms for doccanvas.
//!
//! This crate provides functionality to:
//! - Extract editable blocks with stable, structure-derived ids
//! - Import a DOCX into a canvas model plus classified assets
//! - Export an edited canvas model by patching only the changed paragraphs
//! - Resolve `{{TOKEN}}` placeholders in DOCX, PPTX and XLSX packages
//!
//! Every part the caller did not change leaves the package byte-for-byte as
//! it came in.
//!
//! ## Example: Editing a Block
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use doccanvas_ooxml::api;
//!
//! let original = std::fs::read("letter.docx")?;
//! let extracted = api::extract_editable_blocks_from_ooxml(&original, "docx", "file-1")?;
//!
//! let mut edits = BTreeMap::new();
//! edits.insert(extracted.blocks[0].id.clone(), "Dear customer,".to_string());
//! let patched = api::apply_block_edits_to_ooxml(&original, "docx", &edits)?;
//! std::fs::write("letter-edited.docx", patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod archive;
pub mod arena;
pub mod blocks;
pub mod classify;
pub mod content_types;
pub mod error;
pub mod export;
pub mod import;
pub mod patch;
pub mod placeholders;
pub mod relationships;
pub mod verify;

#[doc(hidden)]
pub mod test_utils;

pub use api::{
    apply_block_edits_to_ooxml, apply_placeholder_map_to_ooxml, changed_block_ids,
    changed_blocks_in_model, export_canvas_model_to_docx, extract_editable_blocks_from_ooxml,
    extract_placeholders_from_ooxml, import_docx_to_canvas_model, ExtractedBlocks, OoxmlFormat,
    PlaceholderOutput,
};
pub use archive::{content_sha256, OoxmlArchive};
pub use blocks::{block_id, extract_blocks, ExtractOptions, StructuralIndex};
pub use classify::{AssetCandidate, AssetClassifier, Classification, KeywordClassifier};
pub use error::{IntegrityViolation, OoxmlError, Result};
pub use import::{asset_id, media_key, ImportOptions, ImportResult};
pub use placeholders::{PlaceholderMap, Resolution};
pub use relationships::Relationships;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
