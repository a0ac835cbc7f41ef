//! DOCX to canvas model
//!
//! Import walks the structural index once, turning blocks into entities and
//! drawings into image or shape entities, then lifts every `word/media/*`
//! part into an [`Asset`] classified through an [`AssetClassifier`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use doccanvas_model::{Asset, Block, BlockKind, CanvasEntity, CanvasModel, EntityKind, Layout};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::archive::{to_hex, OoxmlArchive};
use crate::blocks::{ExtractOptions, StructuralIndex};
use crate::classify::{AssetCandidate, AssetClassifier};
use crate::error::Result;
use crate::relationships::{resolve_target, Relationships};

/// Directory holding embedded media in a DOCX package
pub const MEDIA_DIR: &str = "word/media/";

/// Options for [`import_docx`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub project_id: String,
    pub source_file_id: String,
    /// Timestamp stamped on every imported asset
    pub created_at: DateTime<Utc>,
    pub include_headers_footers: bool,
}

impl ImportOptions {
    pub fn new(project_id: impl Into<String>, source_file_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_file_id: source_file_id.into(),
            created_at: Utc::now(),
            include_headers_footers: true,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Import the document body only
    pub fn body_only(mut self) -> Self {
        self.include_headers_footers = false;
        self
    }
}

/// Canvas model and assets produced by an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub canvas_model: CanvasModel,
    pub assets: Vec<Asset>,
}

/// Deterministic asset id for a media part of a project
///
/// Media written by a previous export is named after its asset id; that id
/// is reused so assets keep their identity across import/export cycles.
pub fn asset_id(project_id: &str, media_path: &str) -> String {
    let stem = media_path
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();
    if is_asset_id(stem) {
        return stem.to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(media_path.as_bytes());
    let digest = to_hex(&hasher.finalize());
    format!("ast_{}", &digest[..16])
}

/// Check for the `ast_` + 16 lowercase hex digit shape
pub fn is_asset_id(candidate: &str) -> bool {
    candidate
        .strip_prefix("ast_")
        .is_some_and(|hex| hex.len() == 16 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
}

/// Media file stem for an asset id
///
/// Ids already in the `ast_` shape are used as-is so they survive reimport.
/// Any other id is hashed into that shape, keeping part names free of path
/// separators and other characters a package cannot hold.
pub fn media_key(asset_id: &str) -> String {
    if is_asset_id(asset_id) {
        return asset_id.to_string();
    }
    let digest = to_hex(&Sha256::digest(asset_id.as_bytes()));
    format!("ast_{}", &digest[..16])
}

/// Guess a MIME type from a file name
pub fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Import a DOCX buffer as a canvas model plus its assets
pub fn import_docx(
    bytes: &[u8],
    options: &ImportOptions,
    classifier: &dyn AssetClassifier,
) -> Result<ImportResult> {
    let archive = OoxmlArchive::open(bytes)?;
    let index = StructuralIndex::build(
        &archive,
        &ExtractOptions {
            include_headers_footers: options.include_headers_footers,
        },
    )?;

    let mut model = CanvasModel::new(&options.project_id, &options.source_file_id);
    model.body_only = !options.include_headers_footers;
    let mut rels: HashMap<&str, Relationships> = HashMap::new();
    let mut hints: HashMap<String, Vec<String>> = HashMap::new();

    for block in index.blocks() {
        if !rels.contains_key(block.part.as_str()) {
            rels.insert(block.part.as_str(), Relationships::for_part(&archive, &block.part)?);
        }
        let part_rels = &rels[block.part.as_str()];

        // Drawing-only paragraphs carry no text entity; whitespace still counts as text
        if !block.text.is_empty() || block.drawings.is_empty() {
            model.push(text_entity(block, model.entities.len()));
        }

        for (n, drawing) in block.drawings.iter().enumerate() {
            let media = drawing
                .rel_id
                .as_deref()
                .and_then(|id| part_rels.get(id))
                .filter(|t| t.is_internal())
                .map(|t| resolve_target(&block.part, &t.target))
                .filter(|path| archive.contains(path));

            let layout = Layout {
                order: model.entities.len(),
                part: Some(block.part.clone()),
                style_id: block.style_id.clone(),
                width_emu: drawing.width_emu,
                height_emu: drawing.height_emu,
                anchor_block_id: Some(block.id.clone()),
            };
            let entity_id = format!("ent_{}_{}", block.id.trim_start_matches("blk_"), n + 1);

            let entity = match media {
                Some(path) => {
                    let entry = hints.entry(path.clone()).or_default();
                    entry.extend(drawing.name.iter().cloned());
                    entry.extend(drawing.description.iter().cloned());
                    CanvasEntity::image(entity_id, asset_id(&options.project_id, &path))
                        .with_layout(layout)
                }
                None => CanvasEntity {
                    kind: EntityKind::Shape,
                    asset_id: None,
                    ..CanvasEntity::image(entity_id, String::new())
                }
                .with_layout(layout),
            };
            model.push(entity);
        }
    }

    let mut assets = Vec::new();
    for path in archive.part_names().filter(|n| n.starts_with(MEDIA_DIR)) {
        let Some(payload) = archive.get(path) else {
            continue;
        };
        let filename = path.rsplit('/').next().unwrap_or(path);
        let mime_type = guess_mime(filename);
        let byte_size = payload.len() as u64;
        let part_hints = hints.get(path).map(Vec::as_slice).unwrap_or_default();

        let verdict = classifier.classify(&AssetCandidate {
            filename,
            mime_type: &mime_type,
            byte_size,
            hints: part_hints.iter().map(String::as_str).collect(),
        });

        assets.push(Asset {
            id: asset_id(&options.project_id, path),
            project_id: options.project_id.clone(),
            filename: filename.to_string(),
            mime_type,
            payload: payload.to_vec(),
            byte_size,
            object_type: verdict.object_type,
            confidence: verdict.confidence,
            created_at: options.created_at,
        });
    }

    log::debug!(
        "imported {} entities and {} assets for project {}",
        model.entities.len(),
        assets.len(),
        options.project_id
    );

    Ok(ImportResult {
        canvas_model: model,
        assets,
    })
}

fn text_entity(block: &Block, order: usize) -> CanvasEntity {
    let kind = match block.kind {
        BlockKind::Paragraph => EntityKind::Text,
        BlockKind::TableCell => EntityKind::Table,
    };
    let mut entity = CanvasEntity::text(
        format!("ent_{}", block.id.trim_start_matches("blk_")),
        block.id.clone(),
        block.text.clone(),
    );
    entity.kind = kind;
    entity.placeholders = block.placeholders.clone();
    entity.with_layout(Layout {
        order,
        part: Some(block.part.clone()),
        style_id: block.style_id.clone(),
        ..Layout::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classification, KeywordClassifier};
    use crate::test_utils::{inline_image_run, rels_xml, DocxBuilder};
    use crate::archive::DOCUMENT_RELS;
    use crate::error::OoxmlError;
    use chrono::TimeZone;
    use doccanvas_model::ObjectType;

    fn options() -> ImportOptions {
        ImportOptions::new("proj-1", "file-1")
            .with_created_at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn docx_with_logo() -> Vec<u8> {
        let body = format!(
            concat!(
                r#"<w:p><w:r><w:t>Dear {{{{CLIENT_NAME}}}},</w:t></w:r></w:p>"#,
                r#"<w:p>{}</w:p>"#,
                r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#
            ),
            inline_image_run("rId5", "Picture 1", "Company logo", 914400, 457200)
        );
        DocxBuilder::new(&body)
            .part(
                DOCUMENT_RELS,
                rels_xml(&[
                    ("rId1", Relationships::TYPE_STYLES, "styles.xml"),
                    ("rId5", Relationships::TYPE_IMAGE, "media/image1.png"),
                ]),
            )
            .part("word/media/image1.png", vec![0x89, b'P', b'N', b'G', 0, 1])
            .content_default("png", "image/png")
            .build()
            .unwrap()
    }

    #[test]
    fn test_entities_follow_blocks() {
        let result = import_docx(&docx_with_logo(), &options(), &KeywordClassifier).unwrap();
        let model = &result.canvas_model;

        assert_eq!(model.project_id, "proj-1");
        assert_eq!(model.source_file_id, "file-1");
        let kinds: Vec<_> = model.entities.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Text, EntityKind::Image, EntityKind::Table]);

        let first = &model.entities[0];
        assert_eq!(first.text, "Dear {{CLIENT_NAME}},");
        assert_eq!(first.placeholders, vec!["CLIENT_NAME".to_string()]);
        assert!(first.block_id.is_some());

        let image = &model.entities[1];
        assert!(image.block_id.is_none());
        assert_eq!(image.layout.width_emu, Some(914400));
        assert!(image.layout.anchor_block_id.is_some());
        assert_eq!(image.asset_id.as_deref(), Some(result.assets[0].id.as_str()));

        let orders: Vec<_> = model.entities.iter().map(|e| e.layout.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_assets_are_classified() {
        let result = import_docx(&docx_with_logo(), &options(), &KeywordClassifier).unwrap();
        assert_eq!(result.assets.len(), 1);

        let asset = &result.assets[0];
        assert_eq!(asset.filename, "image1.png");
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.byte_size, 6);
        assert_eq!(asset.payload.len(), 6);
        assert_eq!(asset.object_type, ObjectType::Logo);
        assert_eq!(asset.project_id, "proj-1");
        assert_eq!(asset.created_at, options().created_at);
        assert!(is_asset_id(&asset.id));
    }

    #[test]
    fn test_import_is_deterministic() {
        let docx = docx_with_logo();
        let first = import_docx(&docx, &options(), &KeywordClassifier).unwrap();
        let second = import_docx(&docx, &options(), &KeywordClassifier).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_classifier() {
        struct Everything;
        impl AssetClassifier for Everything {
            fn classify(&self, candidate: &AssetCandidate<'_>) -> Classification {
                assert_eq!(candidate.hints, vec!["Picture 1", "Company logo"]);
                Classification::new(ObjectType::Textbox, 3.0)
            }
        }

        let result = import_docx(&docx_with_logo(), &options(), &Everything).unwrap();
        assert_eq!(result.assets[0].object_type, ObjectType::Textbox);
        assert_eq!(result.assets[0].confidence, 1.0);
    }

    #[test]
    fn test_drawing_without_media_is_shape() {
        let body = inline_image_run("rId99", "Shape 1", "", 10, 10);
        let docx = DocxBuilder::new(&format!("<w:p>{}</w:p>", body)).build().unwrap();

        let result = import_docx(&docx, &options(), &KeywordClassifier).unwrap();
        assert_eq!(result.canvas_model.entities.len(), 1);
        assert_eq!(result.canvas_model.entities[0].kind, EntityKind::Shape);
        assert!(result.canvas_model.entities[0].asset_id.is_none());
        assert!(result.assets.is_empty());
    }

    #[test]
    fn test_asset_ids() {
        let a = asset_id("proj-1", "word/media/image1.png");
        assert!(is_asset_id(&a));
        assert_eq!(a, asset_id("proj-1", "word/media/image1.png"));
        assert_ne!(a, asset_id("proj-2", "word/media/image1.png"));
        assert_eq!(asset_id("proj-9", &format!("word/media/{}.png", a)), a);
        assert!(!is_asset_id("ast_XYZ"));
    }

    #[test]
    fn test_media_key() {
        let id = asset_id("proj-1", "word/media/image1.png");
        assert_eq!(media_key(&id), id);

        let external = media_key("logo-42");
        assert!(is_asset_id(&external));
        assert_eq!(external, media_key("logo-42"));
        assert_ne!(external, media_key("logo-43"));
        assert!(is_asset_id(&media_key("../../evil/x")));
    }

    #[test]
    fn test_whitespace_beside_drawing_keeps_text_entity() {
        let body = format!(
            r#"<w:p><w:r><w:t xml:space="preserve"> </w:t></w:r>{}</w:p>"#,
            inline_image_run("rId5", "Picture 1", "", 10, 10)
        );
        let docx = DocxBuilder::new(&body)
            .part(
                DOCUMENT_RELS,
                rels_xml(&[("rId5", Relationships::TYPE_IMAGE, "media/image1.png")]),
            )
            .part("word/media/image1.png", vec![0x89, b'P', b'N', b'G'])
            .content_default("png", "image/png")
            .build()
            .unwrap();

        let model = import_docx(&docx, &options(), &KeywordClassifier)
            .unwrap()
            .canvas_model;
        let kinds: Vec<_> = model.entities.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Text, EntityKind::Image]);
        assert_eq!(model.entities[0].text, " ");
    }

    #[test]
    fn test_body_only_scope_recorded() {
        let full = import_docx(&docx_with_logo(), &options(), &KeywordClassifier).unwrap();
        assert!(!full.canvas_model.body_only);

        let body = import_docx(&docx_with_logo(), &options().body_only(), &KeywordClassifier)
            .unwrap();
        assert!(body.canvas_model.body_only);
    }

    #[test]
    fn test_corrupt_input() {
        assert!(matches!(
            import_docx(b"not a zip", &options(), &KeywordClassifier),
            Err(OoxmlError::CorruptArchive(_))
        ));
    }
}
