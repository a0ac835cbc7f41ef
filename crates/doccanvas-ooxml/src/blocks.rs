//! Block extraction
//!
//! A block is the smallest unit of editable text the engine tracks: a
//! top-level paragraph of a story part, or a table cell. Blocks are
//! identified by a hash of their structural path so that the same document
//! yields the same ids on every extraction, whatever the text says.

use doccanvas_model::{Block, BlockKind, CanvasModel, DrawingRef};
use sha2::{Digest, Sha256};

use crate::archive::{to_hex, OoxmlArchive, DOCUMENT_XML};
use crate::arena::{NodeId, XmlArena};
use crate::error::{OoxmlError, Result};
use crate::placeholders;

/// Options for [`extract_blocks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Also walk `word/header*.xml` and `word/footer*.xml`
    pub include_headers_footers: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_headers_footers: true,
        }
    }
}

impl ExtractOptions {
    /// Only the main document body
    pub fn body_only() -> Self {
        Self {
            include_headers_footers: false,
        }
    }

    /// The scope a canvas model was imported with
    pub fn for_model(model: &CanvasModel) -> Self {
        Self {
            include_headers_footers: !model.body_only,
        }
    }
}

/// A block together with the arena nodes that own it
#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub block: Block,
    /// The `w:p` or `w:tc` element
    pub node: NodeId,
    /// Paragraphs whose content makes up the block text
    pub paragraphs: Vec<NodeId>,
}

/// Blocks of a single story part
#[derive(Debug, Clone)]
pub struct PartIndex {
    pub part: String,
    pub arena: XmlArena,
    pub records: Vec<BlockRecord>,
}

/// Every block of a document, addressable by id
#[derive(Debug, Clone)]
pub struct StructuralIndex {
    parts: Vec<PartIndex>,
}

impl StructuralIndex {
    /// Walk the story parts of `archive`
    pub fn build(archive: &OoxmlArchive<'_>, options: &ExtractOptions) -> Result<Self> {
        let document = archive.document_xml()?;
        let arena = parse_part(DOCUMENT_XML, document)?;
        let root = arena.root();
        if arena.local_name(root) != "document" {
            return Err(OoxmlError::DocxParse(format!(
                "{} root is <{}>, expected w:document",
                DOCUMENT_XML,
                arena.node(root).name
            )));
        }
        let body = arena
            .find_child(root, "body")
            .ok_or_else(|| OoxmlError::DocxParse(format!("{} has no w:body", DOCUMENT_XML)))?;

        let mut position = 0;
        let mut parts = vec![index_part(DOCUMENT_XML, arena, body, &mut position)];

        if options.include_headers_footers {
            let mut story_parts: Vec<(&str, (u8, u32))> = archive
                .part_names()
                .filter_map(|name| header_footer_key(name).map(|key| (name, key)))
                .collect();
            story_parts.sort_by_key(|&(_, key)| key);

            for (name, _) in story_parts {
                let Some(xml) = archive.get(name) else {
                    continue;
                };
                let arena = parse_part(name, xml)?;
                let root = arena.root();
                parts.push(index_part(name, arena, root, &mut position));
            }
        }

        log::debug!(
            "indexed {} blocks across {} parts",
            position,
            parts.len()
        );

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[PartIndex] {
        &self.parts
    }

    /// All blocks in document order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.parts
            .iter()
            .flat_map(|p| p.records.iter().map(|r| &r.block))
    }

    /// Locate a block and the part that owns it
    pub fn find(&self, id: &str) -> Option<(&PartIndex, &BlockRecord)> {
        self.parts.iter().find_map(|part| {
            part.records
                .iter()
                .find(|r| r.block.id == id)
                .map(|record| (part, record))
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.parts.iter().map(|p| p.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.parts
            .into_iter()
            .flat_map(|p| p.records.into_iter().map(|r| r.block))
            .collect()
    }
}

/// Extract the ordered block list of a DOCX archive
pub fn extract_blocks(archive: &OoxmlArchive<'_>, options: &ExtractOptions) -> Result<Vec<Block>> {
    Ok(StructuralIndex::build(archive, options)?.into_blocks())
}

/// Deterministic block id for a structural path inside a part
pub fn block_id(part: &str, path: &[usize]) -> String {
    let path = path
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("/");
    let mut hasher = Sha256::new();
    hasher.update(part.as_bytes());
    hasher.update(b"#");
    hasher.update(path.as_bytes());
    let digest = to_hex(&hasher.finalize());
    format!("blk_{}", &digest[..16])
}

fn parse_part(name: &str, xml: &[u8]) -> Result<XmlArena> {
    XmlArena::parse(xml).map_err(|e| OoxmlError::DocxParse(format!("{}: {}", name, e)))
}

/// Sort key for `word/headerN.xml` / `word/footerN.xml`, `None` for other parts
fn header_footer_key(name: &str) -> Option<(u8, u32)> {
    let stem = name.strip_prefix("word/")?.strip_suffix(".xml")?;
    let (kind, number) = if let Some(n) = stem.strip_prefix("header") {
        (0, n)
    } else if let Some(n) = stem.strip_prefix("footer") {
        (1, n)
    } else {
        return None;
    };
    if number.is_empty() {
        return Some((kind, 0));
    }
    number.parse().ok().map(|n| (kind, n))
}

struct Candidate {
    node: NodeId,
    kind: BlockKind,
    paragraphs: Vec<NodeId>,
}

fn index_part(part: &str, arena: XmlArena, container: NodeId, position: &mut usize) -> PartIndex {
    let mut candidates = Vec::new();
    walk_container(&arena, container, &mut candidates);

    let records = candidates
        .into_iter()
        .map(|candidate| {
            let text = candidate
                .paragraphs
                .iter()
                .map(|&p| paragraph_text(&arena, p))
                .collect::<Vec<_>>()
                .join("\n");
            let mut drawings = Vec::new();
            for &p in &candidate.paragraphs {
                collect_drawings(&arena, p, &mut drawings);
            }
            let style_id = candidate
                .paragraphs
                .first()
                .and_then(|&p| paragraph_style(&arena, p));
            let path = arena.path(candidate.node);

            let block = Block {
                id: block_id(part, &path),
                position: *position,
                kind: candidate.kind,
                placeholders: placeholders::extract(&text).into_iter().collect(),
                text,
                part: part.to_string(),
                path,
                style_id,
                drawings,
            };
            *position += 1;

            BlockRecord {
                block,
                node: candidate.node,
                paragraphs: candidate.paragraphs,
            }
        })
        .collect::<Vec<_>>();

    log::debug!("{}: {} blocks", part, records.len());

    PartIndex {
        part: part.to_string(),
        arena,
        records,
    }
}

fn walk_container(arena: &XmlArena, container: NodeId, out: &mut Vec<Candidate>) {
    for &child in arena.children(container) {
        match arena.local_name(child) {
            "p" => out.push(Candidate {
                node: child,
                kind: BlockKind::Paragraph,
                paragraphs: vec![child],
            }),
            "tbl" => walk_table(arena, child, out),
            "sdt" => {
                if let Some(content) = arena.find_child(child, "sdtContent") {
                    walk_container(arena, content, out);
                }
            }
            "customXml" => walk_container(arena, child, out),
            _ => {}
        }
    }
}

fn walk_table(arena: &XmlArena, table: NodeId, out: &mut Vec<Candidate>) {
    for row in table_rows(arena, table) {
        for cell in row_cells(arena, row) {
            let paragraphs = arena
                .children(cell)
                .iter()
                .copied()
                .filter(|&c| arena.local_name(c) == "p")
                .collect();
            out.push(Candidate {
                node: cell,
                kind: BlockKind::TableCell,
                paragraphs,
            });

            for &nested in arena.children(cell) {
                if arena.local_name(nested) == "tbl" {
                    walk_table(arena, nested, out);
                }
            }
        }
    }
}

fn table_rows(arena: &XmlArena, table: NodeId) -> Vec<NodeId> {
    unwrap_content(arena, table, "tr")
}

fn row_cells(arena: &XmlArena, row: NodeId) -> Vec<NodeId> {
    unwrap_content(arena, row, "tc")
}

/// Direct children named `local`, looking through content controls
fn unwrap_content(arena: &XmlArena, parent: NodeId, local: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    for &child in arena.children(parent) {
        match arena.local_name(child) {
            name if name == local => out.push(child),
            "sdt" => {
                if let Some(content) = arena.find_child(child, "sdtContent") {
                    out.extend(unwrap_content(arena, content, local));
                }
            }
            "customXml" => out.extend(unwrap_content(arena, child, local)),
            _ => {}
        }
    }
    out
}

/// Elements whose subtree never contributes to the paragraph's own text
const NON_TEXT: &[&str] = &[
    "pPr",
    "rPr",
    "drawing",
    "pict",
    "object",
    "txbxContent",
    "del",
    "moveFrom",
    "instrText",
    "delText",
    "delInstrText",
    "Fallback",
];

pub(crate) fn paragraph_text(arena: &XmlArena, paragraph: NodeId) -> String {
    let mut text = String::new();
    collect_text(arena, paragraph, &mut text);
    text
}

fn collect_text(arena: &XmlArena, id: NodeId, out: &mut String) {
    for &child in arena.children(id) {
        match arena.local_name(child) {
            name if NON_TEXT.contains(&name) => {}
            "t" => out.push_str(&arena.node(child).text),
            "tab" => out.push('\t'),
            "br" | "cr" => out.push('\n'),
            "noBreakHyphen" => out.push('-'),
            _ => collect_text(arena, child, out),
        }
    }
}

fn paragraph_style(arena: &XmlArena, paragraph: NodeId) -> Option<String> {
    let ppr = arena.find_child(paragraph, "pPr")?;
    let style = arena.find_child(ppr, "pStyle")?;
    arena.attr(style, "val").map(str::to_string)
}

fn collect_drawings(arena: &XmlArena, id: NodeId, out: &mut Vec<DrawingRef>) {
    for &child in arena.children(id) {
        match arena.local_name(child) {
            "drawing" => out.push(drawingml_ref(arena, child)),
            "pict" | "object" => out.push(vml_ref(arena, child)),
            "Fallback" | "txbxContent" => {}
            _ => collect_drawings(arena, child, out),
        }
    }
}

fn drawingml_ref(arena: &XmlArena, drawing: NodeId) -> DrawingRef {
    let mut anchor = DrawingRef::default();
    for node in arena.descendants(drawing) {
        match arena.local_name(node) {
            "extent" if anchor.width_emu.is_none() => {
                anchor.width_emu = arena.attr(node, "cx").and_then(|v| v.parse().ok());
                anchor.height_emu = arena.attr(node, "cy").and_then(|v| v.parse().ok());
            }
            "docPr" if anchor.name.is_none() => {
                anchor.name = arena.attr(node, "name").map(str::to_string);
                anchor.description = arena
                    .attr(node, "descr")
                    .filter(|d| !d.is_empty())
                    .map(str::to_string);
            }
            "blip" if anchor.rel_id.is_none() => {
                anchor.rel_id = arena
                    .attr(node, "embed")
                    .or_else(|| arena.attr(node, "link"))
                    .map(str::to_string);
            }
            _ => {}
        }
    }
    anchor
}

fn vml_ref(arena: &XmlArena, pict: NodeId) -> DrawingRef {
    let mut anchor = DrawingRef::default();
    for node in arena.descendants(pict) {
        match arena.local_name(node) {
            "imagedata" if anchor.rel_id.is_none() => {
                anchor.rel_id = arena.attr(node, "id").map(str::to_string);
                anchor.description = arena.attr(node, "title").map(str::to_string);
            }
            "shape" if anchor.name.is_none() => {
                anchor.name = arena.attr(node, "id").map(str::to_string);
            }
            _ => {}
        }
    }
    anchor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{header_xml, inline_image_run, DocxBuilder};

    fn extract(docx: &[u8], options: ExtractOptions) -> Vec<Block> {
        let archive = OoxmlArchive::open(docx).unwrap();
        extract_blocks(&archive, &options).unwrap()
    }

    #[test]
    fn test_paragraph_text_flattening() {
        let docx = DocxBuilder::new(concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr>"#,
            r#"<w:r><w:t>Total</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">42 </w:t></w:r>"#,
            r#"<w:r><w:br/><w:t>&lt;net&gt;</w:t></w:r>"#,
            r#"<w:r><w:instrText> PAGE </w:instrText></w:r>"#,
            r#"<w:del><w:r><w:delText>old</w:delText></w:r></w:del>"#,
            r#"</w:p>"#
        ))
        .build()
        .unwrap();

        let blocks = extract(&docx, ExtractOptions::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Total\t42 \n<net>");
        assert_eq!(blocks[0].style_id.as_deref(), Some("Heading1"));
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert!(blocks[0].id.starts_with("blk_"));
        assert_eq!(blocks[0].id.len(), 20);
    }

    #[test]
    fn test_table_cells_and_nested_tables() {
        let docx = DocxBuilder::new(concat!(
            r#"<w:p><w:r><w:t>Intro</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr/><w:tr>"#,
            r#"<w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p><w:p><w:r><w:t>line 2</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p/></w:tc>"#,
            r#"</w:tr></w:tbl>"#,
            r#"<w:sectPr/>"#
        ))
        .build()
        .unwrap();

        let blocks = extract(&docx, ExtractOptions::default());
        let texts: Vec<_> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Intro", "A1\nline 2", "B1\n", "inner"]);
        assert_eq!(blocks[1].kind, BlockKind::TableCell);
        assert_eq!(
            blocks.iter().map(|b| b.position).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_ids_are_stable_and_text_independent() {
        let before = DocxBuilder::new(r#"<w:p><w:r><w:t>one</w:t></w:r></w:p><w:p/>"#)
            .build()
            .unwrap();
        let after = DocxBuilder::new(r#"<w:p><w:r><w:t>changed</w:t></w:r></w:p><w:p/>"#)
            .build()
            .unwrap();

        let first = extract(&before, ExtractOptions::default());
        let second = extract(&before, ExtractOptions::default());
        let edited = extract(&after, ExtractOptions::default());

        assert_eq!(first, second);
        let ids = |b: &[Block]| b.iter().map(|b| b.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&edited));
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_block_id_depends_on_part_and_path() {
        assert_eq!(block_id("word/document.xml", &[0, 0, 1]), block_id("word/document.xml", &[0, 0, 1]));
        assert_ne!(block_id("word/document.xml", &[0, 0, 1]), block_id("word/header1.xml", &[0, 0, 1]));
        assert_ne!(block_id("word/document.xml", &[0, 0, 1]), block_id("word/document.xml", &[0, 0, 10]));
        assert_ne!(block_id("word/document.xml", &[0, 1, 0]), block_id("word/document.xml", &[0, 10]));
    }

    #[test]
    fn test_placeholders_listed_per_block() {
        let docx = DocxBuilder::new(
            r#"<w:p><w:r><w:t>{{B}} and {{A}} and {{B}} and {{lower}}</w:t></w:r></w:p>"#,
        )
        .build()
        .unwrap();

        let blocks = extract(&docx, ExtractOptions::default());
        assert_eq!(blocks[0].placeholders, vec!["A".to_string(), "B".to_string()]);
        assert!(blocks[0].has_placeholder("A"));
    }

    #[test]
    fn test_drawings_recorded_not_text() {
        let body = format!(
            r#"<w:p>{}<w:r><w:t>Caption</w:t></w:r></w:p>"#,
            inline_image_run("rId7", "Company Logo", "logo", 914400, 457200)
        );
        let docx = DocxBuilder::new(&body).build().unwrap();

        let blocks = extract(&docx, ExtractOptions::default());
        assert_eq!(blocks[0].text, "Caption");
        assert_eq!(blocks[0].drawings.len(), 1);
        let drawing = &blocks[0].drawings[0];
        assert_eq!(drawing.rel_id.as_deref(), Some("rId7"));
        assert_eq!(drawing.name.as_deref(), Some("Company Logo"));
        assert_eq!(drawing.description.as_deref(), Some("logo"));
        assert_eq!(drawing.width_emu, Some(914400));
        assert_eq!(drawing.height_emu, Some(457200));
    }

    #[test]
    fn test_text_box_content_excluded() {
        let docx = DocxBuilder::new(concat!(
            r#"<w:p><w:r><w:t>Outer</w:t></w:r><w:r><w:pict><v:shape xmlns:v="urn:v">"#,
            r#"<v:textbox><w:txbxContent><w:p><w:r><w:t>Inner</w:t></w:r></w:p></w:txbxContent></v:textbox>"#,
            r#"</v:shape></w:pict></w:r></w:p>"#
        ))
        .build()
        .unwrap();

        let blocks = extract(&docx, ExtractOptions::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Outer");
    }

    #[test]
    fn test_content_controls_are_walked() {
        let docx = DocxBuilder::new(concat!(
            r#"<w:sdt><w:sdtPr/><w:sdtContent><w:p><w:r><w:t>In control</w:t></w:r></w:p></w:sdtContent></w:sdt>"#,
            r#"<w:p><w:sdt><w:sdtContent><w:r><w:t>inline</w:t></w:r></w:sdtContent></w:sdt></w:p>"#
        ))
        .build()
        .unwrap();

        let texts: Vec<_> = extract(&docx, ExtractOptions::default())
            .into_iter()
            .map(|b| b.text)
            .collect();
        assert_eq!(texts, vec!["In control", "inline"]);
    }

    #[test]
    fn test_headers_and_footers_in_name_order() {
        let docx = DocxBuilder::new(r#"<w:p><w:r><w:t>Body</w:t></w:r></w:p>"#)
            .part(
                "word/footer1.xml",
                header_xml(r#"<w:p><w:r><w:t>Foot</w:t></w:r></w:p>"#).replace("w:hdr", "w:ftr"),
            )
            .part("word/header10.xml", header_xml(r#"<w:p><w:r><w:t>H10</w:t></w:r></w:p>"#))
            .part("word/header2.xml", header_xml(r#"<w:p><w:r><w:t>H2</w:t></w:r></w:p>"#))
            .build()
            .unwrap();

        let all = extract(&docx, ExtractOptions::default());
        let parts: Vec<_> = all.iter().map(|b| (b.part.as_str(), b.text.as_str())).collect();
        assert_eq!(
            parts,
            vec![
                ("word/document.xml", "Body"),
                ("word/header2.xml", "H2"),
                ("word/header10.xml", "H10"),
                ("word/footer1.xml", "Foot"),
            ]
        );

        let body = extract(&docx, ExtractOptions::body_only());
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].id, all[0].id);
    }

    #[test]
    fn test_parse_failures() {
        let missing = DocxBuilder::new("").without(DOCUMENT_XML).build().unwrap();
        let archive = OoxmlArchive::open(&missing).unwrap();
        assert!(matches!(
            extract_blocks(&archive, &ExtractOptions::default()),
            Err(OoxmlError::DocxParse(_))
        ));

        let broken = DocxBuilder::new("")
            .part(DOCUMENT_XML, "<w:document><w:body><w:p></w:body>")
            .build()
            .unwrap();
        let archive = OoxmlArchive::open(&broken).unwrap();
        assert!(matches!(
            extract_blocks(&archive, &ExtractOptions::default()),
            Err(OoxmlError::DocxParse(_))
        ));

        let no_body = DocxBuilder::new("")
            .part(DOCUMENT_XML, r#"<w:document xmlns:w="urn:w"/>"#)
            .build()
            .unwrap();
        let archive = OoxmlArchive::open(&no_body).unwrap();
        assert!(matches!(
            extract_blocks(&archive, &ExtractOptions::default()),
            Err(OoxmlError::DocxParse(_))
        ));
    }
}
