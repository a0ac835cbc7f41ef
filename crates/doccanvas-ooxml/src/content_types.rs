//! `[Content_Types].xml` handling
//!
//! Every part in a package needs a content type, either through a
//! `<Default Extension=".."/>` entry or a `<Override PartName=".."/>`.
//! Newly embedded media only ever needs a default for its extension.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// Parsed content type registry
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    /// Extension (lowercase) to content type
    defaults: Vec<(String, String)>,
    /// Part name to content type
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Parse `[Content_Types].xml`
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut types = Self::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let local = e.local_name();
                    let key: &[u8] = match local.as_ref() {
                        b"Default" => b"Extension",
                        b"Override" => b"PartName",
                        _ => b"",
                    };
                    let mut name = None;
                    let mut content_type = None;
                    for attr in e.attributes().filter_map(|a| a.ok()) {
                        let value = attr.unescape_value().ok().map(|s| s.to_string());
                        if attr.key.as_ref() == key {
                            name = value;
                        } else if attr.key.as_ref() == b"ContentType" {
                            content_type = value;
                        }
                    }
                    if let (false, Some(name), Some(content_type)) =
                        (key.is_empty(), name, content_type)
                    {
                        if local.as_ref() == b"Default" {
                            types.defaults.push((name.to_ascii_lowercase(), content_type));
                        } else {
                            types.overrides.push((name, content_type));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OoxmlError::DocxParse(format!(
                        "invalid content types part: {}",
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(types)
    }

    /// Content type registered for an extension
    pub fn default_for(&self, extension: &str) -> Option<&str> {
        let extension = extension.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, ct)| ct.as_str())
    }

    /// Content type of a part, honouring overrides before defaults
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        if let Some((_, ct)) = self.overrides.iter().find(|(p, _)| *p == part_name) {
            return Some(ct);
        }
        let (_, extension) = part.rsplit_once('.')?;
        self.default_for(extension)
    }
}

/// Make sure an extension has a default content type
///
/// Returns the patched XML, or `None` when the extension is already
/// registered and the part can stay untouched.
pub fn ensure_default(xml: &str, extension: &str, content_type: &str) -> Result<Option<String>> {
    let types = ContentTypes::parse(xml.as_bytes())?;
    if types.default_for(extension).is_some() {
        return Ok(None);
    }

    let close = xml.rfind("</Types>").ok_or_else(|| {
        OoxmlError::DocxParse("content types part has no </Types> end tag".to_string())
    })?;
    let entry = format!(
        r#"<Default Extension="{}" ContentType="{}"/>"#,
        escape(extension.to_ascii_lowercase().as_str()),
        escape(content_type)
    );

    let mut patched = String::with_capacity(xml.len() + entry.len());
    patched.push_str(&xml[..close]);
    patched.push_str(&entry);
    patched.push_str(&xml[close..]);
    Ok(Some(patched))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="PNG" ContentType="image/png"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

    #[test]
    fn test_parse_defaults_and_overrides() {
        let types = ContentTypes::parse(TYPES.as_bytes()).unwrap();
        assert_eq!(types.default_for("png"), Some("image/png"));
        assert_eq!(types.default_for("jpeg"), None);
        assert_eq!(
            types.content_type_of("word/document.xml"),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml")
        );
        assert_eq!(types.content_type_of("word/media/a.png"), Some("image/png"));
    }

    #[test]
    fn test_ensure_default_existing_extension_is_noop() {
        assert!(ensure_default(TYPES, "png", "image/png").unwrap().is_none());
    }

    #[test]
    fn test_ensure_default_inserts_before_end_tag() {
        let patched = ensure_default(TYPES, "jpeg", "image/jpeg").unwrap().unwrap();
        assert!(patched.ends_with(r#"<Default Extension="jpeg" ContentType="image/jpeg"/></Types>"#));
        let types = ContentTypes::parse(patched.as_bytes()).unwrap();
        assert_eq!(types.default_for("jpeg"), Some("image/jpeg"));
    }

    #[test]
    fn test_ensure_default_requires_end_tag() {
        let err = ensure_default("<Types/>", "png", "image/png").unwrap_err();
        assert!(matches!(err, OoxmlError::DocxParse(_)));
    }
}
