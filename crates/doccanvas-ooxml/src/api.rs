//! Buffer-in, buffer-out entry points
//!
//! These are the functions callers outside the crate are expected to use.
//! Each takes the complete package bytes and returns new bytes or data; none
//! of them keep state between calls.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use doccanvas_model::{AssetBuffer, Block, CanvasModel};
use serde::{Deserialize, Serialize};

use crate::archive::{OoxmlArchive, DOCUMENT_XML};
use crate::blocks::{ExtractOptions, StructuralIndex};
use crate::classify::{AssetClassifier, KeywordClassifier};
use crate::error::{IntegrityViolation, OoxmlError, Result};
use crate::export::export;
use crate::import::{import_docx, ImportOptions, ImportResult};
use crate::patch::apply_block_edits;
use crate::placeholders::{self, PlaceholderMap};

/// OOXML package flavours the engine recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OoxmlFormat {
    Docx,
    Pptx,
    Xlsx,
}

impl OoxmlFormat {
    /// Parse an extension such as `docx`, `.PPTX` or `report.xlsx`
    pub fn from_ext(ext: &str) -> Option<Self> {
        let ext = ext.rsplit('.').next().unwrap_or(ext).to_ascii_lowercase();
        match ext.as_str() {
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Directory holding the content parts of this format
    pub fn part_prefix(self) -> &'static str {
        match self {
            Self::Docx => "word/",
            Self::Pptx => "ppt/",
            Self::Xlsx => "xl/",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
        }
    }

    /// XML parts that may carry placeholder text
    fn content_parts(self, archive: &OoxmlArchive<'_>) -> Vec<String> {
        archive
            .part_names()
            .filter(|name| name.starts_with(self.part_prefix()) && name.ends_with(".xml"))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for OoxmlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Result of [`apply_placeholder_map_to_ooxml`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderOutput {
    pub output: Vec<u8>,
    /// Tokens present in the document but not resolved, sorted
    pub unresolved: Vec<String>,
}

/// Result of [`extract_editable_blocks_from_ooxml`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedBlocks {
    pub file_id: String,
    pub blocks: Vec<Block>,
}

/// Export a canvas model over the DOCX it was imported from
pub fn export_canvas_model_to_docx(
    model: &CanvasModel,
    original: &[u8],
    changed_block_ids: &BTreeSet<String>,
    asset_map: &HashMap<String, AssetBuffer>,
) -> Result<Vec<u8>> {
    export(model, original, changed_block_ids, asset_map)
}

/// Import a DOCX with the default keyword classifier
pub fn import_docx_to_canvas_model(binary: &[u8], options: &ImportOptions) -> Result<ImportResult> {
    import_docx(binary, options, &KeywordClassifier)
}

/// Import a DOCX with a caller-supplied classifier
pub fn import_docx_with_classifier(
    binary: &[u8],
    options: &ImportOptions,
    classifier: &dyn AssetClassifier,
) -> Result<ImportResult> {
    import_docx(binary, options, classifier)
}

/// Substitute `{{TOKEN}}` placeholders in a DOCX, PPTX or XLSX package
///
/// Unknown formats are returned unchanged with nothing unresolved. For DOCX,
/// tokens split across runs are resolved by rewriting their paragraph.
pub fn apply_placeholder_map_to_ooxml(
    binary: &[u8],
    format_ext: &str,
    map: &PlaceholderMap,
) -> Result<PlaceholderOutput> {
    let Some(format) = OoxmlFormat::from_ext(format_ext) else {
        log::debug!("placeholder fill skipped for unsupported format {:?}", format_ext);
        return Ok(PlaceholderOutput {
            output: binary.to_vec(),
            unresolved: Vec::new(),
        });
    };

    let mut archive = OoxmlArchive::open(binary)?;
    let mut unresolved = BTreeSet::new();

    for part in format.content_parts(&archive) {
        let Some(xml) = archive.get_str(&part) else {
            continue;
        };
        let resolution = placeholders::resolve_xml(xml, map)
            .map_err(|e| OoxmlError::DocxParse(format!("{}: {}", part, e)))?;
        unresolved.extend(resolution.unresolved);
        if let Some(patched) = resolution.xml {
            archive.set_string(part, patched);
        }
    }

    if format == OoxmlFormat::Docx {
        let index = StructuralIndex::build(&archive, &ExtractOptions::default())?;
        let mut edits = BTreeMap::new();
        for block in index.blocks().filter(|b| !b.placeholders.is_empty()) {
            let resolution = placeholders::resolve(&block.text, map);
            unresolved.extend(resolution.unresolved);
            if resolution.text != block.text {
                edits.insert(block.id.clone(), Some(resolution.text));
            }
        }
        if !edits.is_empty() {
            log::debug!("resolving split placeholders in {} blocks", edits.len());
            apply_block_edits(&mut archive, &index, &edits)?;
        }
    }

    Ok(PlaceholderOutput {
        output: archive.to_bytes()?,
        unresolved: unresolved.into_iter().collect(),
    })
}

/// Extract the editable blocks of a DOCX
pub fn extract_editable_blocks_from_ooxml(
    binary: &[u8],
    format_ext: &str,
    file_id: &str,
) -> Result<ExtractedBlocks> {
    require_docx(format_ext)?;
    let archive = OoxmlArchive::open(binary)?;
    let blocks = crate::blocks::extract_blocks(&archive, &ExtractOptions::default())?;
    Ok(ExtractedBlocks {
        file_id: file_id.to_string(),
        blocks,
    })
}

/// Replace the text of DOCX blocks by id
///
/// An empty string clears a block. Unknown ids fail the whole call.
pub fn apply_block_edits_to_ooxml(
    binary: &[u8],
    format_ext: &str,
    edits_by_block_id: &BTreeMap<String, String>,
) -> Result<Vec<u8>> {
    require_docx(format_ext)?;
    let mut archive = OoxmlArchive::open(binary)?;
    let index = StructuralIndex::build(&archive, &ExtractOptions::default())?;

    let edits = edits_by_block_id
        .iter()
        .map(|(id, text)| (id.clone(), Some(text.clone())))
        .collect();
    apply_block_edits(&mut archive, &index, &edits)?;
    let output = archive.to_bytes()?;

    let reopened = OoxmlArchive::open(&output)?;
    let after = StructuralIndex::build(&reopened, &ExtractOptions::default())?;
    if let Some(lost) = index.blocks().find(|b| !after.contains(&b.id)) {
        return Err(IntegrityViolation::BlockLost(lost.id.clone()).into());
    }
    Ok(output)
}

/// Sorted, deduplicated placeholder names in a package
///
/// Unknown formats yield no tokens.
pub fn extract_placeholders_from_ooxml(binary: &[u8], format_ext: &str) -> Result<Vec<String>> {
    let Some(format) = OoxmlFormat::from_ext(format_ext) else {
        return Ok(Vec::new());
    };

    let archive = OoxmlArchive::open(binary)?;
    let mut tokens = BTreeSet::new();
    for part in format.content_parts(&archive) {
        if let Some(xml) = archive.get_str(&part) {
            let found = placeholders::extract_xml(xml)
                .map_err(|e| OoxmlError::DocxParse(format!("{}: {}", part, e)))?;
            tokens.extend(found);
        }
    }
    if format == OoxmlFormat::Docx {
        let index = StructuralIndex::build(&archive, &ExtractOptions::default())?;
        for block in index.blocks() {
            tokens.extend(block.placeholders.iter().cloned());
        }
    }
    Ok(tokens.into_iter().collect())
}

/// Ids of blocks whose text changed or that vanished between two extractions
pub fn changed_block_ids(before: &[Block], after: &[Block]) -> BTreeSet<String> {
    let after: HashMap<&str, &str> = after
        .iter()
        .map(|b| (b.id.as_str(), b.text.as_str()))
        .collect();
    before
        .iter()
        .filter(|b| after.get(b.id.as_str()) != Some(&b.text.as_str()))
        .map(|b| b.id.clone())
        .collect()
}

/// Ids of blocks whose canvas entity was edited or removed
///
/// This is the changed set [`export_canvas_model_to_docx`] expects for a
/// model that was imported from `blocks`. Blocks outside the model's import
/// scope are never reported, and an empty block anchoring a picture has no
/// text entity to lose.
pub fn changed_blocks_in_model(blocks: &[Block], model: &CanvasModel) -> BTreeSet<String> {
    blocks
        .iter()
        .filter(|b| !model.body_only || b.part == DOCUMENT_XML)
        .filter(|b| match model.entity_for_block(&b.id) {
            Some(entity) => entity.text != b.text,
            None => !(b.text.is_empty() && model.anchors_block(&b.id)),
        })
        .map(|b| b.id.clone())
        .collect()
}

fn require_docx(format_ext: &str) -> Result<()> {
    match OoxmlFormat::from_ext(format_ext) {
        Some(OoxmlFormat::Docx) => Ok(()),
        _ => Err(OoxmlError::UnsupportedFormat(format_ext.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{header_xml, inline_image_run, DocxBuilder};
    use doccanvas_model::CanvasEntity;

    #[test]
    fn test_format_from_ext() {
        assert_eq!(OoxmlFormat::from_ext("docx"), Some(OoxmlFormat::Docx));
        assert_eq!(OoxmlFormat::from_ext(".PPTX"), Some(OoxmlFormat::Pptx));
        assert_eq!(OoxmlFormat::from_ext("budget.xlsx"), Some(OoxmlFormat::Xlsx));
        assert_eq!(OoxmlFormat::from_ext("pdf"), None);
        assert_eq!(OoxmlFormat::Xlsx.part_prefix(), "xl/");
        assert_eq!(OoxmlFormat::Pptx.to_string(), "pptx");
    }

    #[test]
    fn test_unknown_format_passthrough() {
        let out = apply_placeholder_map_to_ooxml(b"anything", "odt", &PlaceholderMap::new()).unwrap();
        assert_eq!(out.output, b"anything");
        assert!(out.unresolved.is_empty());
        assert!(extract_placeholders_from_ooxml(b"anything", "odt").unwrap().is_empty());
    }

    #[test]
    fn test_block_extraction_is_docx_only() {
        let docx = DocxBuilder::new("<w:p/>").build().unwrap();
        assert!(matches!(
            extract_editable_blocks_from_ooxml(&docx, "pptx", "f1"),
            Err(OoxmlError::UnsupportedFormat(_))
        ));
        let extracted = extract_editable_blocks_from_ooxml(&docx, "docx", "f1").unwrap();
        assert_eq!(extracted.file_id, "f1");
        assert_eq!(extracted.blocks.len(), 1);
    }

    #[test]
    fn test_changed_block_ids() {
        let docx = DocxBuilder::new(r#"<w:p><w:r><w:t>a</w:t></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p>"#)
            .build()
            .unwrap();
        let before = extract_editable_blocks_from_ooxml(&docx, "docx", "f").unwrap().blocks;
        let mut after = before.clone();
        after[1].text = "B".into();

        let changed = changed_block_ids(&before, &after);
        assert_eq!(changed, BTreeSet::from([before[1].id.clone()]));

        let changed = changed_block_ids(&before, &after[..1]);
        assert_eq!(changed, BTreeSet::from([before[1].id.clone()]));
        assert!(changed_block_ids(&before, &before).is_empty());
    }

    #[test]
    fn test_changed_blocks_respect_model_scope() {
        let docx = DocxBuilder::new(r#"<w:p><w:r><w:t>Body</w:t></w:r></w:p>"#)
            .part(
                "word/header1.xml",
                header_xml(r#"<w:p><w:r><w:t>Header</w:t></w:r></w:p>"#),
            )
            .build()
            .unwrap();
        let blocks = extract_editable_blocks_from_ooxml(&docx, "docx", "f").unwrap().blocks;
        assert_eq!(blocks.len(), 2);

        let mut model = CanvasModel::new("p", "f");
        model.push(CanvasEntity::text("e1", blocks[0].id.clone(), "Body"));
        assert_eq!(
            changed_blocks_in_model(&blocks, &model),
            BTreeSet::from([blocks[1].id.clone()])
        );

        model.body_only = true;
        assert!(changed_blocks_in_model(&blocks, &model).is_empty());
    }

    #[test]
    fn test_picture_anchor_block_is_unchanged() {
        let docx = DocxBuilder::new(&format!(
            "<w:p>{}</w:p><w:p><w:r><w:t>Caption</w:t></w:r></w:p>",
            inline_image_run("rId9", "Shape", "", 1, 1)
        ))
        .build()
        .unwrap();
        let blocks = extract_editable_blocks_from_ooxml(&docx, "docx", "f").unwrap().blocks;

        let mut model = CanvasModel::new("p", "f");
        let mut shape = CanvasEntity::image("e1", "");
        shape.layout.anchor_block_id = Some(blocks[0].id.clone());
        model.push(shape);
        assert_eq!(
            changed_blocks_in_model(&blocks, &model),
            BTreeSet::from([blocks[1].id.clone()])
        );
    }
}
