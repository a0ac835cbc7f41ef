//! Addressable element tree over a raw XML part
//!
//! Every element is stored once in a flat arena together with the byte span
//! it occupies in the source, so that callers can locate a node structurally
//! and then splice the original bytes without re-serializing anything else.

use std::borrow::Cow;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Index of a node in an [`XmlArena`]
pub type NodeId = usize;

/// Reasons an XML part cannot be turned into an arena
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("closing tag without a matching start tag at byte {0}")]
    StrayEnd(usize),

    #[error("no root element")]
    Empty,
}

/// One element of the tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Qualified name as written, e.g. `w:p`
    pub name: String,
    pub parent: Option<NodeId>,
    /// Position among the parent's element children
    pub index_in_parent: usize,
    pub children: Vec<NodeId>,
    /// Attributes in source order, keys qualified, values unescaped
    pub attrs: Vec<(String, String)>,
    /// Unescaped character data that is a direct child of this element
    pub text: String,
    /// Bytes from `<` of the start tag to `>` of the end tag
    pub span: Range<usize>,
    /// Bytes between the start and end tag (empty for `<x/>`)
    pub content: Range<usize>,
    pub self_closing: bool,
}

impl Node {
    fn document(len: usize) -> Self {
        Node {
            name: String::new(),
            parent: None,
            index_in_parent: 0,
            children: Vec::new(),
            attrs: Vec::new(),
            text: String::new(),
            span: 0..len,
            content: 0..len,
            self_closing: false,
        }
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix, if the name has one
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }
}

/// Flat element tree; node 0 is a virtual document node
#[derive(Debug, Clone)]
pub struct XmlArena {
    nodes: Vec<Node>,
}

impl XmlArena {
    /// The virtual document node that owns the root element
    pub const DOCUMENT: NodeId = 0;

    /// Parse a complete XML document or fragment with a single root
    pub fn parse(xml: &[u8]) -> Result<Self, ArenaError> {
        let mut reader = Reader::from_reader(xml);
        let mut nodes = vec![Node::document(xml.len())];
        let mut stack: Vec<NodeId> = vec![Self::DOCUMENT];
        let mut buf = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event_into(&mut buf)?;
            let end = reader.buffer_position() as usize;
            match event {
                Event::Start(e) => {
                    let id = push_node(&mut nodes, &stack, &e, start..end, false);
                    stack.push(id);
                }
                Event::Empty(e) => {
                    push_node(&mut nodes, &stack, &e, start..end, true);
                }
                Event::End(_) => {
                    let id = match stack.pop() {
                        Some(id) if id != Self::DOCUMENT => id,
                        _ => return Err(ArenaError::StrayEnd(start)),
                    };
                    let node = &mut nodes[id];
                    node.content.end = start;
                    node.span.end = end;
                }
                Event::Text(t) => {
                    if let Some(&top) = stack.last() {
                        if top != Self::DOCUMENT {
                            let text = t.unescape()?;
                            nodes[top].text.push_str(&text);
                        }
                    }
                }
                Event::CData(c) => {
                    if let Some(&top) = stack.last() {
                        if top != Self::DOCUMENT {
                            nodes[top].text.push_str(&String::from_utf8_lossy(&c));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(&open) = stack.last() {
            if open != Self::DOCUMENT {
                return Err(ArenaError::Unclosed(nodes[open].name.clone()));
            }
        }
        if nodes[Self::DOCUMENT].children.is_empty() {
            return Err(ArenaError::Empty);
        }

        Ok(Self { nodes })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The root element
    pub fn root(&self) -> NodeId {
        self.nodes[Self::DOCUMENT].children[0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn local_name(&self, id: NodeId) -> &str {
        self.nodes[id].local_name()
    }

    /// First direct child with the given local name
    pub fn find_child(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.local_name(child) == local)
    }

    /// Attribute value matched by local name (`r:embed` matches `embed`)
    pub fn attr(&self, id: NodeId, local: &str) -> Option<&str> {
        self.nodes[id]
            .attrs
            .iter()
            .find(|(key, _)| key.rsplit(':').next() == Some(local))
            .map(|(_, value)| value.as_str())
    }

    /// All descendants in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether any descendant has one of the given local names
    pub fn has_descendant(&self, id: NodeId, locals: &[&str]) -> bool {
        self.descendants(id)
            .into_iter()
            .any(|d| locals.contains(&self.local_name(d)))
    }

    /// Chain of element indices from the root element down to `id`
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            path.push(self.nodes[current].index_in_parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Source text of the element
    pub fn raw<'x>(&self, xml: &'x str, id: NodeId) -> &'x str {
        &xml[self.nodes[id].span.clone()]
    }

    /// The start tag as written; a self-closing tag is reopened
    pub fn open_tag<'x>(&self, xml: &'x str, id: NodeId) -> Cow<'x, str> {
        let node = &self.nodes[id];
        if node.self_closing {
            let tag = &xml[node.span.clone()];
            let trimmed = tag.trim_end_matches('>').trim_end_matches('/').trim_end();
            Cow::Owned(format!("{}>", trimmed))
        } else {
            Cow::Borrowed(&xml[node.span.start..node.content.start])
        }
    }

    /// The matching end tag for the element
    pub fn close_tag(&self, id: NodeId) -> String {
        format!("</{}>", self.nodes[id].name)
    }
}

fn push_node(
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    e: &BytesStart<'_>,
    span: Range<usize>,
    self_closing: bool,
) -> NodeId {
    let parent = stack.last().copied().unwrap_or(XmlArena::DOCUMENT);
    let id = nodes.len();
    let index_in_parent = nodes[parent].children.len();
    let attrs = e
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            };
            (key, value)
        })
        .collect();
    let content = span.end..span.end;

    nodes[parent].children.push(id);
    nodes.push(Node {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        parent: Some(parent),
        index_in_parent,
        children: Vec::new(),
        attrs,
        text: String::new(),
        span,
        content,
        self_closing,
    });
    id
}

/// Check that `xml` parses into a single well-formed tree
pub fn check_well_formed(xml: &[u8]) -> Result<(), ArenaError> {
    XmlArena::parse(xml).map(|_| ())
}
