//! Node identifiers and the closed set of node kinds.

use crate::title::PageTitle;
use std::fmt;

/// Stable identifier of a node inside one [`Document`](super::Document).
///
/// Identifiers are never reused within a document; in HTML they appear as
/// `id="mw<N>"`, the root being `mw0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
    /// Exclusive upper bound of node indices.
    pub const LIMIT: u32 = u32::MAX;

    pub fn new(index: u32) -> Self {
        NodeId(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn html_id(&self) -> String {
        self.to_string()
    }

    /// Parse an `mw<N>` id; non-canonical spellings such as `mw01` and
    /// indices at or above [`NodeId::LIMIT`] are rejected.
    pub fn from_html_id(id: &str) -> Option<Self> {
        let digits = id.strip_prefix("mw")?;
        let index: u32 = digits.parse().ok()?;
        (index < Self::LIMIT && index.to_string() == digits).then_some(NodeId(index))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mw{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading { level: u8 },
    List { ordered: bool },
    ListItem,
    HorizontalRule,
    /// Verbatim block; holds a single text child.
    Preformatted,
    Text(String),
    Bold,
    Italic,
    WikiLink { target: PageTitle },
    /// Template call; rendered as an opaque placeholder.
    Transclusion { target: PageTitle },
    /// Markup that could not be converted; holds its raw source as text.
    Unparsed,
    Nowiki,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem => "list-item",
            NodeKind::HorizontalRule => "horizontal-rule",
            NodeKind::Preformatted => "preformatted",
            NodeKind::Text(_) => "text",
            NodeKind::Bold => "bold",
            NodeKind::Italic => "italic",
            NodeKind::WikiLink { .. } => "wikilink",
            NodeKind::Transclusion { .. } => "transclusion",
            NodeKind::Unparsed => "unparsed",
            NodeKind::Nowiki => "nowiki",
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph
                | NodeKind::Heading { .. }
                | NodeKind::List { .. }
                | NodeKind::HorizontalRule
                | NodeKind::Preformatted
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }
}
