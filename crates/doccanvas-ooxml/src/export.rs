//! Canvas model back to DOCX
//!
//! Export starts from the original package and touches only what the edit
//! requires: the parts holding changed blocks, media for new or replaced
//! assets, and the relationship and content-type parts that register them.
//! Every other entry is copied through unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use doccanvas_model::{AssetBuffer, CanvasEntity, CanvasModel, EntityKind};
use quick_xml::escape::escape;

use crate::archive::{OoxmlArchive, CONTENT_TYPES, DOCUMENT_RELS, DOCUMENT_XML};
use crate::arena::{check_well_formed, XmlArena};
use crate::blocks::{ExtractOptions, StructuralIndex};
use crate::content_types::ensure_default;
use crate::error::{IntegrityViolation, OoxmlError, Result};
use crate::import::{asset_id, guess_mime, media_key, MEDIA_DIR};
use crate::patch::{apply_block_edits, malformed, splice};
use crate::relationships::Relationships;
use crate::verify::{verify_assets, verify_blocks, verify_export};

/// Extent used for inserted pictures without a layout size (2 inches)
pub const DEFAULT_IMAGE_EMU: i64 = 1_828_800;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Export a canvas model over its original DOCX
///
/// Blocks listed in `changed_block_ids` take their text from the entity
/// bound to them; a listed block with no entity is cleared. Assets the model
/// references but the package lacks are embedded from `asset_buffers`,
/// under a media name derived with [`media_key`]. A model imported from the
/// body alone only sees body blocks, so header and footer parts stay as they
/// are. When nothing changes the original buffer is returned as-is, after the
/// same integrity checks an edited export gets.
pub fn export(
    model: &CanvasModel,
    original: &[u8],
    changed_block_ids: &BTreeSet<String>,
    asset_buffers: &HashMap<String, AssetBuffer>,
) -> Result<Vec<u8>> {
    let mut archive = OoxmlArchive::open(original)?;
    let index = StructuralIndex::build(&archive, &ExtractOptions::for_model(model))?;

    let mut edits = BTreeMap::new();
    let mut deleted = BTreeSet::new();
    for id in changed_block_ids {
        if !index.contains(id) {
            return Err(IntegrityViolation::UnknownBlock(id.clone()).into());
        }
        match model.entity_for_block(id) {
            Some(entity) => {
                edits.insert(id.clone(), Some(entity.text.clone()));
            }
            None => {
                edits.insert(id.clone(), None);
                deleted.insert(id.clone());
            }
        }
    }

    apply_block_edits(&mut archive, &index, &edits)?;
    embed_assets(&mut archive, model, asset_buffers)?;

    if !archive.is_modified() {
        verify_blocks(model, &index, &deleted)?;
        verify_assets(model, &archive)?;
        log::debug!("export of {} changed nothing", model.source_file_id);
        return Ok(original.to_vec());
    }

    log::debug!("export rewrote parts: {:?}", archive.modified_parts());
    let output = archive.to_bytes()?;
    verify_export(model, &output, &deleted)?;
    Ok(output)
}

/// A picture to append to the body
struct NewDrawing {
    rel_id: String,
    name: String,
    width_emu: i64,
    height_emu: i64,
}

fn embed_assets(
    archive: &mut OoxmlArchive<'_>,
    model: &CanvasModel,
    asset_buffers: &HashMap<String, AssetBuffer>,
) -> Result<()> {
    let existing: HashMap<String, String> = archive
        .part_names()
        .filter(|name| name.starts_with(MEDIA_DIR))
        .map(|name| (asset_id(&model.project_id, name), name.to_string()))
        .collect();

    let mut rels: Option<Relationships> = None;
    let mut content_types: Vec<(String, String)> = Vec::new();
    let mut drawings = Vec::new();

    for id in model.asset_ids() {
        let key = media_key(id);
        if let Some(path) = existing.get(&key) {
            if let Some(buffer) = asset_buffers.get(id) {
                archive.set(path.clone(), buffer.bytes.clone());
            }
            continue;
        }

        let buffer = asset_buffers
            .get(id)
            .ok_or_else(|| IntegrityViolation::MissingAsset(id.to_string()))?;
        let extension = media_extension(buffer);
        let media_path = format!("{}{}.{}", MEDIA_DIR, key, extension);
        archive.set(media_path.clone(), buffer.bytes.clone());

        let rels = match &mut rels {
            Some(rels) => rels,
            slot => slot.insert(Relationships::for_part(archive, DOCUMENT_XML)?),
        };
        let rel_id = rels.add(format!("media/{}.{}", key, extension), Relationships::TYPE_IMAGE);
        log::debug!("embedded asset {} as {} ({})", id, media_path, rel_id);

        let content_type = if buffer.mime_type.is_empty() {
            guess_mime(&buffer.filename)
        } else {
            buffer.mime_type.clone()
        };
        content_types.push((extension, content_type));

        drawings.extend(
            model
                .entities
                .iter()
                .filter(|e| e.kind == EntityKind::Image && e.asset_id.as_deref() == Some(id))
                .map(|entity| new_drawing(entity, &rel_id, &buffer.filename)),
        );
    }

    if let Some(rels) = rels {
        let xml = match archive.get_str(DOCUMENT_RELS) {
            Some(original) => rels.patch_xml(original),
            None => rels.to_xml(),
        };
        archive.set_string(DOCUMENT_RELS, xml);
    }

    if !content_types.is_empty() {
        let mut xml = archive
            .get_str(CONTENT_TYPES)
            .ok_or_else(|| OoxmlError::DocxParse(format!("missing required part {}", CONTENT_TYPES)))?
            .to_string();
        for (extension, content_type) in &content_types {
            if let Some(updated) = ensure_default(&xml, extension, content_type)? {
                xml = updated;
            }
        }
        archive.set_string(CONTENT_TYPES, xml);
    }

    if !drawings.is_empty() {
        append_drawings(archive, &drawings)?;
    }
    Ok(())
}

fn new_drawing(entity: &CanvasEntity, rel_id: &str, filename: &str) -> NewDrawing {
    NewDrawing {
        rel_id: rel_id.to_string(),
        name: if filename.is_empty() {
            entity.id.clone()
        } else {
            filename.to_string()
        },
        width_emu: entity.layout.width_emu.unwrap_or(DEFAULT_IMAGE_EMU),
        height_emu: entity.layout.height_emu.unwrap_or(DEFAULT_IMAGE_EMU),
    }
}

/// Extension for a new media part, from the file name or else the MIME type
fn media_extension(buffer: &AssetBuffer) -> String {
    let from_name = buffer
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }

    let ext = match buffer.mime_type.as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/x-emf" | "image/emf" => "emf",
        "image/x-wmf" | "image/wmf" => "wmf",
        _ => "bin",
    };
    ext.to_string()
}

/// Append one inline picture paragraph per drawing, before the final `w:sectPr`
fn append_drawings(archive: &mut OoxmlArchive<'_>, drawings: &[NewDrawing]) -> Result<()> {
    let patched = {
        let xml = archive
            .get_str(DOCUMENT_XML)
            .ok_or_else(|| OoxmlError::DocxParse(format!("{} is not UTF-8 text", DOCUMENT_XML)))?;
        let arena = XmlArena::parse(xml.as_bytes())
            .map_err(|e| OoxmlError::DocxParse(format!("{}: {}", DOCUMENT_XML, e)))?;
        let body = arena
            .find_child(arena.root(), "body")
            .ok_or_else(|| OoxmlError::DocxParse(format!("{} has no w:body", DOCUMENT_XML)))?;

        let mut next_id = arena
            .descendants(arena.root())
            .into_iter()
            .filter(|&n| arena.local_name(n) == "docPr")
            .filter_map(|n| arena.attr(n, "id").and_then(|v| v.parse::<u32>().ok()))
            .max()
            .unwrap_or(0);

        let prefix = arena.node(body).prefix();
        let mut paragraphs = String::new();
        for drawing in drawings {
            next_id += 1;
            paragraphs.push_str(&drawing_paragraph(prefix, next_id, drawing));
        }

        let node = arena.node(body);
        let splice_at = if node.self_closing {
            (
                node.span.clone(),
                format!("{}{}{}", arena.open_tag(xml, body), paragraphs, arena.close_tag(body)),
            )
        } else {
            let at = match arena.children(body).last() {
                Some(&last) if arena.local_name(last) == "sectPr" => arena.node(last).span.start,
                _ => node.content.end,
            };
            (at..at, paragraphs)
        };

        let patched = splice(xml, vec![splice_at]);
        check_well_formed(patched.as_bytes()).map_err(|e| malformed(DOCUMENT_XML, e.to_string()))?;
        patched
    };

    log::debug!("appended {} picture paragraphs", drawings.len());
    archive.set_string(DOCUMENT_XML, patched);
    Ok(())
}

fn drawing_paragraph(prefix: Option<&str>, doc_pr_id: u32, drawing: &NewDrawing) -> String {
    let w = |local: &str| match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    };
    let name = escape(drawing.name.as_str());
    let (cx, cy) = (drawing.width_emu, drawing.height_emu);

    format!(
        concat!(
            "<{p}><{r}><{d}>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="{ns_wp}" xmlns:a="{ns_a}" xmlns:pic="{ns_pic}" xmlns:r="{ns_r}">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<a:graphic><a:graphicData uri="{ns_pic}"><pic:pic>"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline>"#,
            "</{d}></{r}></{p}>"
        ),
        p = w("p"),
        r = w("r"),
        d = w("drawing"),
        ns_wp = NS_WP,
        ns_a = NS_A,
        ns_pic = NS_PIC,
        ns_r = NS_R,
        cx = cx,
        cy = cy,
        id = doc_pr_id,
        name = name,
        rel = escape(drawing.rel_id.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_part, DocxBuilder};

    #[test]
    fn test_media_extension() {
        let named = AssetBuffer::new(vec![], "Logo.PNG", "image/png");
        assert_eq!(media_extension(&named), "png");
        let unnamed = AssetBuffer::new(vec![], "", "image/jpeg");
        assert_eq!(media_extension(&unnamed), "jpg");
        let unknown = AssetBuffer::new(vec![], "blob", "application/x-thing");
        assert_eq!(media_extension(&unknown), "bin");
    }

    #[test]
    fn test_drawing_inserted_before_section_properties() {
        let docx = DocxBuilder::new(concat!(
            r#"<w:p><w:r><w:t>Text</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="4" name="x"/></wp:inline></w:drawing></w:r></w:p>"#,
            r#"<w:sectPr><w:pgSz w:w="12240"/></w:sectPr>"#
        ))
        .build()
        .unwrap();
        let mut archive = OoxmlArchive::open(&docx).unwrap();
        let drawing = NewDrawing {
            rel_id: "rId9".into(),
            name: "a&b.png".into(),
            width_emu: 10,
            height_emu: 20,
        };

        append_drawings(&mut archive, &[drawing]).unwrap();
        let out = archive.to_bytes().unwrap();
        let xml = String::from_utf8(read_part(&out, DOCUMENT_XML).unwrap()).unwrap();

        let inserted = xml.find(r#"<wp:docPr id="5" name="a&amp;b.png"/>"#).unwrap();
        let section = xml.find("<w:sectPr>").unwrap();
        assert!(inserted < section);
        assert!(xml.contains(r#"<a:blip r:embed="rId9"/>"#));
        assert!(xml.contains(r#"<wp:extent cx="10" cy="20"/>"#));
    }

    #[test]
    fn test_drawing_inserted_into_empty_body() {
        let docx = DocxBuilder::new("")
            .part(
                DOCUMENT_XML,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body/></w:document>"#,
            )
            .build()
            .unwrap();
        let mut archive = OoxmlArchive::open(&docx).unwrap();
        let drawing = NewDrawing {
            rel_id: "rId2".into(),
            name: "pic".into(),
            width_emu: DEFAULT_IMAGE_EMU,
            height_emu: DEFAULT_IMAGE_EMU,
        };

        append_drawings(&mut archive, &[drawing]).unwrap();
        let xml = archive.get_str(DOCUMENT_XML).unwrap();
        assert!(xml.starts_with(r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:drawing>"#));
        assert!(xml.ends_with("</w:drawing></w:r></w:p></w:body></w:document>"));
        assert!(xml.contains(r#"<wp:docPr id="1" name="pic"/>"#));
    }
}
