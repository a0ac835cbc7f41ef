//! doccanvas-model - Canvas model definitions
//!
//! This crate provides the types shared between the OOXML engine and its
//! callers: extracted blocks, the editor-facing canvas model, and the
//! assets a canvas model references.

pub mod asset;
pub mod block;
pub mod canvas;

pub use asset::{Asset, AssetBuffer, AssetId, ObjectType, ParseObjectTypeError};
pub use block::{Block, BlockId, BlockKind, DrawingRef};
pub use canvas::{CanvasEntity, CanvasModel, EntityKind, Layout};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
