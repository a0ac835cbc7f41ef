//! The editor-facing canvas model
//!
//! A canvas model is an ordered list of editable entities. Text and table
//! entities map to exactly one extracted block; image and shape entities
//! reference an asset and, when they come from the source document, the
//! block their drawing is anchored in.

use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::block::BlockId;

/// Kind of an editable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Paragraph text
    Text,
    /// Embedded picture
    Image,
    /// Drawing without an embedded picture
    Shape,
    /// Table cell text
    Table,
}

/// Layout metadata carried by an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Order of the entity on the canvas
    pub order: usize,
    /// Archive part the entity was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    /// Paragraph style ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    /// Width in EMUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_emu: Option<i64>,
    /// Height in EMUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_emu: Option<i64>,
    /// Block the entity's drawing is anchored in (images and shapes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_block_id: Option<BlockId>,
}

/// An editable entity on the canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEntity {
    /// Entity id
    pub id: String,
    /// Entity kind
    pub kind: EntityKind,
    /// Extracted block this entity edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<BlockId>,
    /// Current text
    #[serde(default)]
    pub text: String,
    /// Placeholder tokens referenced by the text
    #[serde(default)]
    pub placeholders: Vec<String>,
    /// Referenced asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// Layout metadata
    #[serde(default)]
    pub layout: Layout,
}

impl CanvasEntity {
    /// Create a text entity bound to a block
    pub fn text(id: impl Into<String>, block_id: impl Into<BlockId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Text,
            block_id: Some(block_id.into()),
            text: text.into(),
            placeholders: Vec::new(),
            asset_id: None,
            layout: Layout::default(),
        }
    }

    /// Create an image entity referencing an asset
    pub fn image(id: impl Into<String>, asset_id: impl Into<AssetId>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Image,
            block_id: None,
            text: String::new(),
            placeholders: Vec::new(),
            asset_id: Some(asset_id.into()),
            layout: Layout::default(),
        }
    }

    /// Set layout metadata
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

/// Structured, editor-facing representation of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasModel {
    /// Owning project
    pub project_id: String,
    /// Source file the model was imported from
    #[serde(default)]
    pub source_file_id: String,
    /// Imported from the main document body only, without headers or footers
    #[serde(default, skip_serializing_if = "is_false")]
    pub body_only: bool,
    /// Entities in canvas order
    #[serde(default)]
    pub entities: Vec<CanvasEntity>,
}

impl CanvasModel {
    /// Create an empty model
    pub fn new(project_id: impl Into<String>, source_file_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_file_id: source_file_id.into(),
            body_only: false,
            entities: Vec::new(),
        }
    }

    /// Append an entity
    pub fn push(&mut self, entity: CanvasEntity) {
        self.entities.push(entity);
    }

    /// Find the entity editing a block
    pub fn entity_for_block(&self, block_id: &str) -> Option<&CanvasEntity> {
        self.entities
            .iter()
            .find(|e| e.block_id.as_deref() == Some(block_id))
    }

    /// Replace the text of the entity editing a block
    ///
    /// Returns `false` when no entity edits that block.
    pub fn set_block_text(&mut self, block_id: &str, text: impl Into<String>) -> bool {
        match self
            .entities
            .iter_mut()
            .find(|e| e.block_id.as_deref() == Some(block_id))
        {
            Some(entity) => {
                entity.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Remove the entity editing a block, returning it
    pub fn remove_block(&mut self, block_id: &str) -> Option<CanvasEntity> {
        let index = self
            .entities
            .iter()
            .position(|e| e.block_id.as_deref() == Some(block_id))?;
        Some(self.entities.remove(index))
    }

    /// Block ids referenced by entities, in canvas order
    pub fn block_ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().filter_map(|e| e.block_id.as_deref())
    }

    /// Check whether any image or shape entity is anchored in a block
    pub fn anchors_block(&self, block_id: &str) -> bool {
        self.entities
            .iter()
            .any(|e| e.layout.anchor_block_id.as_deref() == Some(block_id))
    }

    /// Asset ids referenced by entities, in first-seen order without duplicates
    pub fn asset_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for id in self.entities.iter().filter_map(|e| e.asset_id.as_deref()) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
