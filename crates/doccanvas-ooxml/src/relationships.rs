//! Package relationships (`_rels/*.rels`)
//!
//! A part reaches embedded media only through an image relationship in its
//! own `.rels` part. Edits append entries; parsed entries are never
//! rewritten, so [`Relationships::patch_xml`] splices new ones into the
//! original bytes.
//!
//! ```ignore
//! let mut rels = Relationships::for_part(&archive, "word/document.xml")?;
//! let id = rels.add("media/logo.png", Relationships::TYPE_IMAGE);
//! archive.set_string(DOCUMENT_RELS, rels.patch_xml(original));
//! ```

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::archive::OoxmlArchive;
use crate::error::{OoxmlError, Result};

/// Namespace of `.rels` parts
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One `<Relationship>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`
    pub external: bool,
}

impl Relationship {
    pub fn is_internal(&self) -> bool {
        !self.external
    }

    pub fn is_image(&self) -> bool {
        self.rel_type.ends_with("/image")
    }

    fn from_element(e: &BytesStart<'_>) -> Option<Self> {
        let mut id = None;
        let mut rel_type = String::new();
        let mut target = None;
        let mut external = false;

        for attr in e.attributes().flatten() {
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            match attr.key.as_ref() {
                b"Id" => id = Some(value.into_owned()),
                b"Type" => rel_type = value.into_owned(),
                b"Target" => target = Some(value.into_owned()),
                b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
                _ => {}
            }
        }

        Some(Self {
            id: id?,
            rel_type,
            target: target?,
            external,
        })
    }

    fn write_to(&self, xml: &mut String) {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            escape(self.id.as_str()),
            escape(self.rel_type.as_str()),
            escape(self.target.as_str())
        ));
        if self.external {
            xml.push_str(r#" TargetMode="External""#);
        }
        xml.push_str("/>");
    }
}

/// Ordered relationships of one part
#[derive(Debug, Clone)]
pub struct Relationships {
    entries: Vec<Relationship>,
    /// Entries `[..parsed]` came from the source XML
    parsed: usize,
    next_id: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            parsed: 0,
            next_id: 1,
        }
    }
}

impl Relationships {
    pub const TYPE_IMAGE: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const TYPE_STYLES: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

    pub fn new() -> Self {
        Self::default()
    }

    /// Relationships of a part in `archive`, empty when it has no `.rels`
    pub fn for_part(archive: &OoxmlArchive<'_>, part: &str) -> Result<Self> {
        match archive.get(&rels_path_for(part)) {
            Some(xml) => Self::parse(xml),
            None => Ok(Self::new()),
        }
    }

    /// Parse a `.rels` part
    ///
    /// Entries missing `Id` or `Target` are skipped.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut entries = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    entries.extend(Relationship::from_element(&e));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OoxmlError::DocxParse(format!(
                        "invalid relationships part: {}",
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        let next_id = entries
            .iter()
            .filter_map(|r| numeric_id(&r.id))
            .max()
            .map_or(1, |max| max + 1);
        Ok(Self {
            parsed: entries.len(),
            entries,
            next_id,
        })
    }

    /// Append an internal relationship, returning its id
    ///
    /// Ids continue after the highest numeric `rIdN` and never reuse an
    /// existing id.
    pub fn add(&mut self, target: impl Into<String>, rel_type: impl Into<String>) -> String {
        let mut id = format!("rId{}", self.next_id);
        while self.get(&id).is_some() {
            self.next_id += 1;
            id = format!("rId{}", self.next_id);
        }
        self.next_id += 1;

        self.entries.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.into(),
            target: target.into(),
            external: false,
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Target of a relationship id
    pub fn target(&self, id: &str) -> Option<&str> {
        self.get(id).map(|r| r.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    /// Serialize every entry as a fresh `.rels` part
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{}\">",
            RELATIONSHIPS_NS
        );
        for rel in &self.entries {
            rel.write_to(&mut xml);
        }
        xml.push_str("</Relationships>");
        xml
    }

    /// Insert the entries added since parsing before `</Relationships>`
    ///
    /// Bytes of `original` are otherwise kept. Without an end tag the whole
    /// part is reserialized.
    pub fn patch_xml(&self, original: &str) -> String {
        let added = &self.entries[self.parsed..];
        if added.is_empty() {
            return original.to_string();
        }
        let Some(close) = original.rfind("</Relationships>") else {
            return self.to_xml();
        };

        let mut xml = String::with_capacity(original.len() + added.len() * 160);
        xml.push_str(&original[..close]);
        for rel in added {
            rel.write_to(&mut xml);
        }
        xml.push_str(&original[close..]);
        xml
    }
}

/// `word/document.xml` → `word/_rels/document.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part),
    }
}

/// `word/_rels/document.xml.rels` → `word/document.xml`
///
/// `None` for paths that are not relationship parts.
pub fn source_part(rels_part: &str) -> Option<String> {
    let (dir, file) = rels_part.rsplit_once("_rels/")?;
    let name = file.strip_suffix(".rels")?;
    Some(format!("{}{}", dir, name))
}

/// Resolve a target against the directory of the part that owns it
///
/// A leading `/` means package root. `..` steps out of the source directory.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn numeric_id(id: &str) -> Option<u32> {
    let digits = id.get(..3).filter(|p| p.eq_ignore_ascii_case("rid")).map(|_| &id[3..])?;
    digits.parse().ok()
}
