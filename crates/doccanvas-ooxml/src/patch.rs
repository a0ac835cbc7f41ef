//! Surgical paragraph rewriting
//!
//! Edits never re-serialize a whole part. Each edited paragraph is rebuilt
//! from its own bytes, keeping everything that is not text, and spliced back
//! into the part over its original byte range.

use std::collections::BTreeMap;
use std::ops::Range;

use quick_xml::escape::escape;

use crate::archive::OoxmlArchive;
use crate::arena::{check_well_formed, NodeId, XmlArena};
use crate::blocks::{BlockRecord, StructuralIndex};
use crate::error::{IntegrityViolation, OoxmlError, Result};

/// Paragraph children that are replaced by the new text run
const TEXT_CONTAINERS: &[&str] = &[
    "r",
    "hyperlink",
    "fldSimple",
    "smartTag",
    "ins",
    "customXml",
    "sdt",
    "dir",
    "bdo",
];

/// Paragraph children dropped on rewrite
const DROPPED: &[&str] = &["del", "moveFrom", "moveTo", "proofErr"];

/// Elements that make a run worth keeping verbatim
const GRAPHICS: &[&str] = &["drawing", "pict", "object"];

/// Apply text edits to the blocks of `archive`
///
/// `edits` maps block ids to their new text; `None` clears the block while
/// keeping its paragraphs. Every id is checked before anything is written.
pub fn apply_block_edits(
    archive: &mut OoxmlArchive<'_>,
    index: &StructuralIndex,
    edits: &BTreeMap<String, Option<String>>,
) -> Result<Vec<String>> {
    for id in edits.keys() {
        if !index.contains(id) {
            return Err(IntegrityViolation::UnknownBlock(id.clone()).into());
        }
    }

    let mut patched_parts = Vec::new();
    for part in index.parts() {
        let records: Vec<(&BlockRecord, &str)> = part
            .records
            .iter()
            .filter_map(|r| {
                edits
                    .get(&r.block.id)
                    .map(|text| (r, text.as_deref().unwrap_or_default()))
            })
            .collect();
        if records.is_empty() {
            continue;
        }

        let patched = {
            let xml = archive
                .get_str(&part.part)
                .ok_or_else(|| OoxmlError::DocxParse(format!("{} is not UTF-8 text", part.part)))?;
            patch_part(&part.part, xml, &part.arena, &records)?
        };

        log::debug!("{}: rewrote {} blocks", part.part, records.len());
        archive.set(part.part.clone(), patched.into_bytes());
        patched_parts.push(part.part.clone());
    }

    Ok(patched_parts)
}

/// Rebuild the edited blocks of one part and splice them in
pub(crate) fn patch_part(
    part: &str,
    xml: &str,
    arena: &XmlArena,
    records: &[(&BlockRecord, &str)],
) -> Result<String> {
    let mut splices = Vec::new();
    for (record, text) in records {
        if record.paragraphs.is_empty() {
            return Err(malformed(part, format!("block {} has no paragraphs", record.block.id)));
        }
        let lines = distribute(text, record.paragraphs.len());
        for (&paragraph, line) in record.paragraphs.iter().zip(lines) {
            let replacement = rewrite_paragraph(xml, arena, paragraph, &line);
            check_well_formed(replacement.as_bytes()).map_err(|e| {
                malformed(part, format!("block {}: {}", record.block.id, e))
            })?;
            splices.push((arena.node(paragraph).span.clone(), replacement));
        }
    }

    let patched = splice(xml, splices);
    check_well_formed(patched.as_bytes()).map_err(|e| malformed(part, e.to_string()))?;
    Ok(patched)
}

pub(crate) fn malformed(part: &str, reason: String) -> OoxmlError {
    IntegrityViolation::MalformedXml {
        part: part.to_string(),
        reason,
    }
    .into()
}

/// Replace byte ranges of `xml`, applied back to front
pub(crate) fn splice(xml: &str, mut splices: Vec<(Range<usize>, String)>) -> String {
    splices.sort_by_key(|(range, _)| range.start);
    let mut out = xml.to_string();
    for (range, replacement) in splices.into_iter().rev() {
        out.replace_range(range, &replacement);
    }
    out
}

/// Spread text over a block's paragraphs, one line each
///
/// Surplus lines stay on the last paragraph, missing ones leave it empty.
fn distribute(text: &str, paragraphs: usize) -> Vec<String> {
    if paragraphs <= 1 {
        return vec![text.to_string()];
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = (0..paragraphs - 1)
        .map(|i| lines.get(i).copied().unwrap_or_default().to_string())
        .collect();
    out.push(match lines.get(paragraphs - 1..) {
        Some(rest) => rest.join("\n"),
        None => String::new(),
    });
    out
}

/// Rebuild one paragraph around new text
fn rewrite_paragraph(xml: &str, arena: &XmlArena, paragraph: NodeId, text: &str) -> String {
    let prefix = arena.node(paragraph).prefix().map(str::to_string);
    let mut out = String::new();
    out.push_str(&arena.open_tag(xml, paragraph));

    let run = |props: Option<&str>| text_run(prefix.as_deref(), props, text);
    let mut placed = false;

    for &child in arena.children(paragraph) {
        let local = arena.local_name(child);
        if DROPPED.contains(&local) {
            continue;
        }
        if !TEXT_CONTAINERS.contains(&local) || arena.has_descendant(child, GRAPHICS) {
            out.push_str(arena.raw(xml, child));
            continue;
        }
        if !placed {
            placed = true;
            out.push_str(&run(first_run_props(xml, arena, child)));
        }
    }
    if !placed {
        out.push_str(&run(None));
    }

    out.push_str(&arena.close_tag(paragraph));
    out
}

/// `w:rPr` of the first run under `node` that carries text
fn first_run_props<'x>(xml: &'x str, arena: &XmlArena, node: NodeId) -> Option<&'x str> {
    let runs = std::iter::once(node)
        .chain(arena.descendants(node))
        .filter(|&n| arena.local_name(n) == "r");
    for run in runs {
        if arena.find_child(run, "t").is_some() {
            return arena.find_child(run, "rPr").map(|props| arena.raw(xml, props));
        }
    }
    None
}

fn text_run(prefix: Option<&str>, props: Option<&str>, text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|&c| !c.is_control() || c == '\t' || c == '\n')
        .collect();
    if text.is_empty() {
        return String::new();
    }

    let tag = |local: &str| match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    };

    let mut run = format!("<{}>", tag("r"));
    if let Some(props) = props {
        run.push_str(props);
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push_str(&format!("<{}/>", tag("br")));
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                run.push_str(&format!("<{}/>", tag("tab")));
            }
            if !segment.is_empty() {
                run.push_str(&format!(
                    "<{t} xml:space=\"preserve\">{}</{t}>",
                    escape(segment),
                    t = tag("t")
                ));
            }
        }
    }
    run.push_str(&format!("</{}>", tag("r")));
    run
}
