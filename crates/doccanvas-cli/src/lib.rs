//! doccanvas CLI - Command-line interface library
//!
//! This library provides the CLI functionality for doccanvas, including:
//! - Blocks / Import: inspect a DOCX as editable blocks or a canvas model
//! - Edit / Export: write changes back by patching only what changed
//! - Fill / Tokens: resolve `{{TOKEN}}` placeholders in DOCX, PPTX and XLSX
//! - Pdf: convert a DOCX with an external office suite
//!
//! # Binary Usage
//!
//! ```bash
//! # List block ids and text
//! doccanvas blocks letter.docx --body-only
//!
//! # Replace block text from a JSON object of id -> text
//! doccanvas edit letter.docx --edits edits.json -o letter-edited.docx
//!
//! # Fill placeholders
//! doccanvas fill deck.pptx --values values.json -o deck-filled.pptx
//! ```

pub mod app;
pub mod config;

pub use app::{
    blocks_command, edit_command, export_command, fill_command, import_command, init_logging,
    pdf_command, tokens_command,
};
pub use app::{run_cli, OutputFormat};
pub use config::Settings;
