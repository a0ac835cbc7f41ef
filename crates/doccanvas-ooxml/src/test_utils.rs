//! Shared test fixtures for doccanvas-ooxml
//!
//! Builds small but valid DOCX packages in memory, so unit and integration
//! tests do not depend on binary files.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::archive::{CONTENT_TYPES, DOCUMENT_RELS, DOCUMENT_XML};
use crate::error::Result;
use crate::relationships::Relationships;

/// Namespace declarations used by generated document parts
pub const DOCUMENT_NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#
);

/// Wrap body content in a complete `word/document.xml`
pub fn document_xml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document {}><w:body>{}</w:body></w:document>",
        DOCUMENT_NAMESPACES, body
    )
}

/// Wrap content in a header part
pub fn header_xml(content: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:hdr {}>{}</w:hdr>",
        DOCUMENT_NAMESPACES, content
    )
}

/// Build a `.rels` part from `(id, type, target)` triples
pub fn rels_xml(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for (id, rel_type, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, rel_type, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// A run holding an inline picture
pub fn inline_image_run(rel_id: &str, name: &str, descr: &str, cx: i64, cy: i64) -> String {
    format!(
        concat!(
            r#"<w:r><w:drawing><wp:inline><wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="1" name="{name}" descr="{descr}"/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:blipFill><a:blip r:embed="{rel_id}"/></pic:blipFill></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
        ),
        cx = cx,
        cy = cy,
        name = name,
        descr = descr,
        rel_id = rel_id
    )
}

/// Builder for in-memory DOCX packages
#[derive(Debug, Clone)]
pub struct DocxBuilder {
    parts: Vec<(String, Vec<u8>)>,
    defaults: Vec<(String, String)>,
    compression: CompressionMethod,
}

impl DocxBuilder {
    /// Start a package whose body holds the given content
    pub fn new(body: &str) -> Self {
        let parts = vec![
            (
                "_rels/.rels".to_string(),
                rels_xml(&[(
                    "rId1",
                    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
                    "word/document.xml",
                )])
                .into_bytes(),
            ),
            (
                DOCUMENT_RELS.to_string(),
                rels_xml(&[("rId1", Relationships::TYPE_STYLES, "styles.xml")]).into_bytes(),
            ),
            (DOCUMENT_XML.to_string(), document_xml(body).into_bytes()),
        ];
        Self {
            parts,
            defaults: vec![
                (
                    "rels".to_string(),
                    "application/vnd.openxmlformats-package.relationships+xml".to_string(),
                ),
                ("xml".to_string(), "application/xml".to_string()),
            ],
            compression: CompressionMethod::Deflated,
        }
    }

    /// Add or replace a part
    pub fn part(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        let contents = contents.into();
        match self.parts.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = contents,
            None => self.parts.push((path.to_string(), contents)),
        }
        self
    }

    /// Remove a part
    pub fn without(mut self, path: &str) -> Self {
        self.parts.retain(|(p, _)| p != path);
        self
    }

    /// Register a default content type for an extension
    pub fn content_default(mut self, extension: &str, content_type: &str) -> Self {
        self.defaults
            .push((extension.to_string(), content_type.to_string()));
        self
    }

    /// Compression method for every entry
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Content types part for the current defaults
    fn content_types(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        );
        for (ext, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                ext, content_type
            ));
        }
        xml.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
        xml.push_str("</Types>");
        xml
    }

    /// Write the package
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(self.compression);

        zip.start_file(CONTENT_TYPES, options)?;
        zip.write_all(self.content_types().as_bytes())?;
        for (path, contents) in &self.parts {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(contents)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Read a part's decompressed contents
pub fn read_part(docx: &[u8], path: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).ok()?;
    let mut file = archive.by_name(path).ok()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).ok()?;
    Some(contents)
}

/// Read a part's raw entry: compressed bytes, compression method and CRC-32
pub fn raw_entry(docx: &[u8], path: &str) -> Option<(Vec<u8>, CompressionMethod, u32)> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).ok()?;
    for i in 0..archive.len() {
        let mut file = archive.by_index_raw(i).ok()?;
        if file.name() == path {
            let method = file.compression();
            let crc = file.crc32();
            let mut raw = Vec::new();
            file.read_to_end(&mut raw).ok()?;
            return Some((raw, method, crc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::OoxmlArchive;

    #[test]
    fn test_builder_produces_valid_package() {
        let docx = DocxBuilder::new("<w:p/>").build().unwrap();
        let archive = OoxmlArchive::open(&docx).unwrap();
        assert!(archive.contains(CONTENT_TYPES));
        assert!(archive.contains(DOCUMENT_XML));
        assert!(archive.contains(DOCUMENT_RELS));
    }

    #[test]
    fn test_read_part() {
        let docx = DocxBuilder::new("<w:p/>").build().unwrap();
        let xml = String::from_utf8(read_part(&docx, DOCUMENT_XML).unwrap()).unwrap();
        assert!(xml.contains("<w:body><w:p/></w:body>"));
        assert!(read_part(&docx, "missing.xml").is_none());
    }

    #[test]
    fn test_content_default() {
        let docx = DocxBuilder::new("<w:p/>")
            .content_default("png", "image/png")
            .build()
            .unwrap();
        let types = String::from_utf8(read_part(&docx, CONTENT_TYPES).unwrap()).unwrap();
        assert!(types.contains(r#"Extension="png""#));
    }
}
