//! Placeholder tokens (`{{NAME}}`)
//!
//! Token names consist of uppercase ASCII letters, digits and underscores.
//! Markers that do not match exactly (lowercase names, spaces, single
//! braces, unbalanced braces) are plain text and never reported.
//!
//! Unresolved tokens are data, not errors: resolution leaves them verbatim
//! and reports their names sorted and deduplicated.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};

use doccanvas_model::Block;

/// Token name to replacement value
pub type PlaceholderMap = HashMap<String, String>;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([A-Z0-9_]+)\}\}").expect("valid placeholder regex"))
}

/// Token names in order of occurrence (duplicates kept)
pub fn extract_all(text: &str) -> Vec<String> {
    pattern()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Distinct token names, sorted
pub fn extract(text: &str) -> BTreeSet<String> {
    extract_all(text).into_iter().collect()
}

/// Occurrence count per token name
pub fn count(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for token in extract_all(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Check whether a string is a valid token name
pub fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

/// Outcome of resolving placeholders in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Text with every resolvable token substituted
    pub text: String,
    /// Tokens left verbatim, sorted and deduplicated
    pub unresolved: Vec<String>,
}

/// Usable replacement value for a token
fn value_for<'m>(map: &'m PlaceholderMap, token: &str) -> Option<&'m str> {
    map.get(token)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn replace_with<'t>(
    text: &'t str,
    map: &PlaceholderMap,
    unresolved: &mut BTreeSet<String>,
    render: impl Fn(&str) -> String,
) -> Cow<'t, str> {
    pattern().replace_all(text, |caps: &Captures| match value_for(map, &caps[1]) {
        Some(value) => render(value),
        None => {
            unresolved.insert(caps[1].to_string());
            caps[0].to_string()
        }
    })
}

/// Resolve placeholders in plain text
///
/// Matching is case-sensitive. Tokens missing from `map`, or mapped to an
/// empty or whitespace-only value, stay in the text and are reported.
pub fn resolve(text: &str, map: &PlaceholderMap) -> Resolution {
    let mut unresolved = BTreeSet::new();
    let text = replace_with(text, map, &mut unresolved, str::to_string).into_owned();
    Resolution {
        text,
        unresolved: unresolved.into_iter().collect(),
    }
}

/// Resolve placeholders across blocks
///
/// Returns one resolved text per block (in block order) and the merged set
/// of unresolved tokens.
pub fn resolve_blocks(blocks: &[Block], map: &PlaceholderMap) -> (Vec<String>, Vec<String>) {
    let mut unresolved = BTreeSet::new();
    let texts = blocks
        .iter()
        .map(|b| replace_with(&b.text, map, &mut unresolved, str::to_string).into_owned())
        .collect();
    (texts, unresolved.into_iter().collect())
}

/// Result of resolving placeholders inside an XML part
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlResolution {
    /// Patched XML; `None` when nothing was substituted
    pub xml: Option<String>,
    /// Tokens seen but left verbatim
    pub unresolved: BTreeSet<String>,
}

/// Resolve placeholders inside the text nodes of an XML document
///
/// Markup and attribute values are never touched. Substituted values are
/// XML-escaped. Tokens split across several text nodes are not seen here.
pub(crate) fn resolve_xml(xml: &str, map: &PlaceholderMap) -> std::result::Result<XmlResolution, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut unresolved = BTreeSet::new();
    let mut patches: Vec<(usize, usize, String)> = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Text(_) => {
                let end = reader.buffer_position() as usize;
                let raw = &xml[start..end];
                if let Cow::Owned(replaced) =
                    replace_with(raw, map, &mut unresolved, |v| escape(v).into_owned())
                {
                    patches.push((start, end, replaced));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if patches.is_empty() {
        return Ok(XmlResolution {
            xml: None,
            unresolved,
        });
    }

    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (start, end, replacement) in patches {
        out.push_str(&xml[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&xml[cursor..]);

    Ok(XmlResolution {
        xml: Some(out),
        unresolved,
    })
}

/// Token names found in the text nodes of an XML document
pub(crate) fn extract_xml(xml: &str) -> std::result::Result<BTreeSet<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut tokens = BTreeSet::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => tokens.extend(extract(&t.unescape()?)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(tokens)
}

/// Merge placeholder values from several layers
///
/// Later layers override earlier ones. Empty or whitespace-only override
/// values are ignored (values are trimmed), and tokens in `locked` keep
/// their base value no matter what the layers say.
pub fn effective_map(
    base: &PlaceholderMap,
    layers: &[&PlaceholderMap],
    locked: &HashSet<String>,
) -> PlaceholderMap {
    let mut merged = base.clone();
    for layer in layers {
        for (token, value) in layer.iter() {
            if locked.contains(token) {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            merged.insert(token.clone(), value.to_string());
        }
    }
    merged
}
