//! Annotated HTML → document
//!
//! Parses with html5ever into an rcdom tree and walks `<body>`. Element ids
//! of the form `mwN` are kept so annotations stored out of band (a page
//! bundle) can be matched back to their nodes. Unknown elements are
//! unwrapped; their content still lands in the document.

use crate::annotations::Namespace;
use crate::codec::{Codec, CodecValue, DecodeIssue};
use crate::error::FormatError;
use crate::formats::wikitext::WIKITEXT_MODEL;
use crate::ir::{Document, NodeId, NodeKind, TreeError};
use crate::title::PageTitle;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Annotations keyed by element id, as a page bundle stores them.
pub type IdMap = BTreeMap<String, Value>;

/// Out-of-band annotation source for [`read_html`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalData<'a> {
    pub parsoid: Option<&'a IdMap>,
    pub mw: Option<&'a IdMap>,
    /// Overrides the content model named in the HTML head
    pub content_model: Option<&'a str>,
}

impl<'a> ExternalData<'a> {
    fn get(&self, namespace: Namespace, id: &str) -> Option<&'a Value> {
        let map = match namespace {
            Namespace::Parsoid => self.parsoid,
            Namespace::Mw => self.mw,
        };
        map.and_then(|m| m.get(id))
    }

    fn ids(&self) -> impl Iterator<Item = &'a String> + 'a {
        let parsoid = self.parsoid.into_iter().flat_map(|m| m.keys());
        let mw = self.mw.into_iter().flat_map(|m| m.keys());
        parsoid.chain(mw)
    }
}

/// Result of reading an HTML page.
#[derive(Debug)]
pub struct ParsedHtml {
    pub document: Document,
    /// `mw:htmlVersion` from the head, if any
    pub version: Option<String>,
    /// Annotation entries that could not be decoded and were skipped
    pub issues: Vec<DecodeIssue>,
    /// Out-of-band entries whose element is gone
    pub orphans: usize,
}

/// Parse HTML with inline annotations only.
pub fn parse_from_html(html: &str) -> Result<Document, FormatError> {
    read_html(html, ExternalData::default()).map(|parsed| parsed.document)
}

/// Parse HTML, taking annotations from `data-*` attributes first and from
/// `external` for elements without them.
pub fn read_html(html: &str, external: ExternalData<'_>) -> Result<ParsedHtml, FormatError> {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let body = find_element(&dom.document, "body")
        .ok_or_else(|| FormatError::ParseError("HTML has no body".to_string()))?;
    let meta = head_meta(&dom.document);
    let content_model = external
        .content_model
        .map(str::to_string)
        .or_else(|| meta.get("mw:contentModel").cloned())
        .unwrap_or_else(|| WIKITEXT_MODEL.to_string());

    let mut reader = Reader {
        doc: Document::new(content_model),
        codec: Codec::new(),
        external,
        issues: Vec::new(),
    };
    let max_id = max_element_id(&body);
    reader.doc.reserve_ids(NodeId::new(max_id.saturating_add(1)));
    reader.load_annotations(NodeId::ROOT, &body);
    reader
        .children(&body, NodeId::ROOT)
        .map_err(|e| FormatError::ParseError(e.to_string()))?;

    let orphans = reader
        .external
        .ids()
        .filter(|id| NodeId::from_html_id(id).map_or(true, |node| !reader.doc.contains(node)))
        .count();
    if orphans > 0 {
        tracing::warn!(orphans, "dropping annotations without a matching element");
    }
    if !reader.issues.is_empty() {
        tracing::warn!(count = reader.issues.len(), "skipped undecodable annotations");
    }

    Ok(ParsedHtml {
        document: reader.doc,
        version: meta.get("mw:htmlVersion").cloned(),
        issues: reader.issues,
        orphans,
    })
}

struct Reader<'a> {
    doc: Document,
    codec: Codec,
    external: ExternalData<'a>,
    issues: Vec<DecodeIssue>,
}

enum Mapped {
    Node(NodeKind),
    /// Keep the children, drop the element.
    Unwrap,
    Skip,
}

impl Reader<'_> {
    fn children(&mut self, handle: &Handle, parent: NodeId) -> Result<(), TreeError> {
        for child in handle.children.borrow().iter() {
            self.node(child, parent)?;
        }
        Ok(())
    }

    fn node(&mut self, handle: &Handle, parent: NodeId) -> Result<(), TreeError> {
        match &handle.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.text(parent, &text)
            }
            NodeData::Element { name, .. } => {
                let tag = name.local.to_string();
                match self.map_element(handle, &tag) {
                    Mapped::Node(kind) => self.element(handle, parent, kind),
                    Mapped::Unwrap => {
                        tracing::debug!(tag, "unwrapping unknown element");
                        self.children(handle, parent)
                    }
                    Mapped::Skip => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn text(&mut self, parent: NodeId, text: &str) -> Result<(), TreeError> {
        let parent_kind = self.doc.kind(parent);
        if matches!(parent_kind, Some(NodeKind::Root | NodeKind::List { .. }))
            && text.trim().is_empty()
        {
            return Ok(());
        }
        // Unwrapped elements can leave text runs side by side.
        if let Some(&last) = self.doc.children(parent).last() {
            if let Some(previous) = self.doc.kind(last).and_then(NodeKind::text) {
                let merged = format!("{previous}{text}");
                return self.doc.set_text(last, merged);
            }
        }
        self.doc
            .append_child(parent, NodeKind::Text(text.to_string()))
            .map(|_| ())
    }

    fn map_element(&self, handle: &Handle, tag: &str) -> Mapped {
        let attrs = attributes(handle);
        let types = attrs.get("typeof").map(String::as_str).unwrap_or("");
        let has_type = |t: &str| types.split_whitespace().any(|x| x == t);
        let kind = match tag {
            "p" => NodeKind::Paragraph,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => NodeKind::Heading {
                level: tag[1..].parse().unwrap_or(2),
            },
            "ul" => NodeKind::List { ordered: false },
            "ol" => NodeKind::List { ordered: true },
            "li" => NodeKind::ListItem,
            "hr" => NodeKind::HorizontalRule,
            "b" | "strong" => NodeKind::Bold,
            "i" | "em" => NodeKind::Italic,
            "div" if has_class(&attrs, "mw-code") => NodeKind::Preformatted,
            "pre" => NodeKind::Preformatted,
            "a" => match attrs.get("href").map(|h| PageTitle::from_href(h)) {
                Some(Ok(target)) => NodeKind::WikiLink { target },
                _ => return Mapped::Unwrap,
            },
            "span" if has_type("mw:Transclusion") => match self.template_target(&attrs) {
                Some(target) => NodeKind::Transclusion { target },
                None => {
                    tracing::debug!("transclusion without a template name");
                    return Mapped::Skip;
                }
            },
            "span" if has_type("mw:Nowiki") => NodeKind::Nowiki,
            "span" if has_type("mw:Error") => NodeKind::Unparsed,
            "script" | "style" | "head" | "template" => return Mapped::Skip,
            _ => return Mapped::Unwrap,
        };
        Mapped::Node(kind)
    }

    fn template_target(&self, attrs: &HashMap<String, String>) -> Option<PageTitle> {
        let inline = attrs
            .get(Namespace::Mw.attribute())
            .and_then(|json| self.codec.parse_str(json).ok());
        let tree = inline.or_else(|| {
            attrs
                .get("id")
                .and_then(|id| self.external.get(Namespace::Mw, id))
                .cloned()
        })?;
        let template = tree.get("template")?;
        match self.codec.decode_value(template).ok()? {
            CodecValue::Title(title) => Some(title),
            CodecValue::String(name) => PageTitle::new(&name).ok(),
            _ => None,
        }
    }

    fn element(&mut self, handle: &Handle, parent: NodeId, kind: NodeKind) -> Result<(), TreeError> {
        let text_only = matches!(kind, NodeKind::Unparsed | NodeKind::Nowiki | NodeKind::Preformatted);
        let skip_children = matches!(
            kind,
            NodeKind::Transclusion { .. } | NodeKind::HorizontalRule
        );

        let id = match element_id(handle) {
            Some(id) if !self.doc.contains(id) => {
                self.doc.append_child_with_id(parent, id, kind)?;
                id
            }
            _ => self.doc.append_child(parent, kind)?,
        };
        self.load_annotations(id, handle);

        if skip_children {
            return Ok(());
        }
        if text_only {
            let text = collect_text(handle);
            if !text.is_empty() {
                self.doc.append_child(id, NodeKind::Text(text))?;
            }
            return Ok(());
        }
        self.children(handle, id)
    }

    fn load_annotations(&mut self, node: NodeId, handle: &Handle) {
        let attrs = attributes(handle);
        for namespace in [Namespace::Parsoid, Namespace::Mw] {
            let tree = match attrs.get(namespace.attribute()) {
                Some(json) => match self.codec.parse_str(json) {
                    Ok(tree) => Some(tree),
                    Err(error) => {
                        self.issues.push(DecodeIssue {
                            location: format!("{node}.{}", namespace.attribute()),
                            error,
                        });
                        None
                    }
                },
                None => self.external.get(namespace, &node.html_id()).cloned(),
            };
            let Some(tree) = tree else { continue };
            match self.doc.load_annotations(node, namespace, &tree, &self.codec) {
                Ok(issues) => self.issues.extend(issues.into_iter().map(|issue| DecodeIssue {
                    location: format!("{node}.{}.{}", namespace.attribute(), issue.location),
                    error: issue.error,
                })),
                Err(error) => self.issues.push(DecodeIssue {
                    location: format!("{node}.{}", namespace.attribute()),
                    error,
                }),
            }
        }
    }
}

fn attributes(handle: &Handle) -> HashMap<String, String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect(),
        _ => HashMap::new(),
    }
}

fn has_class(attrs: &HashMap<String, String>, class: &str) -> bool {
    attrs
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

fn element_id(handle: &Handle) -> Option<NodeId> {
    attributes(handle)
        .get("id")
        .and_then(|id| NodeId::from_html_id(id))
}

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if is_element(handle, tag) {
        return Some(handle.clone());
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn max_element_id(handle: &Handle) -> u32 {
    let own = element_id(handle).map_or(0, |id| id.index());
    handle
        .children
        .borrow()
        .iter()
        .map(max_element_id)
        .fold(own, u32::max)
}

fn collect_text(handle: &Handle) -> String {
    let mut out = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => out.push_str(&collect_text(child)),
            _ => {}
        }
    }
    out
}

/// `property` → `content` of the `<meta>` elements in `<head>`.
fn head_meta(document: &Handle) -> HashMap<String, String> {
    let mut meta = HashMap::new();
    if let Some(head) = find_element(document, "head") {
        for child in head.children.borrow().iter() {
            if !is_element(child, "meta") {
                continue;
            }
            let attrs = attributes(child);
            if let (Some(property), Some(content)) = (attrs.get("property"), attrs.get("content")) {
                meta.insert(property.clone(), content.clone());
            }
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::html::serializer::{serialize_to_html, HtmlOptions};
    use crate::formats::wikitext::to_document;
    use serde_json::json;

    #[test]
    fn reads_back_what_the_serializer_writes() {
        let doc = to_document(b"== Intro ==\nHello [[World|planet]] and '''bold'''.\n* one\n* two", "wikitext");
        let html = serialize_to_html(&doc, &HtmlOptions::default()).unwrap();
        let parsed = read_html(&html, ExternalData::default()).unwrap();
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.version.as_deref(), Some("2.8.0"));
        assert!(parsed.document.subtree_equal(NodeId::ROOT, &doc, NodeId::ROOT));
        assert_eq!(parsed.document.annotations(), doc.annotations());
    }

    #[test]
    fn element_ids_are_kept_and_text_gets_fresh_ids() {
        let parsed =
            parse_from_html(r#"<body><p id="mw7">a<b id="mw9">b</b></p></body>"#).unwrap();
        let doc = parsed;
        let p = NodeId::new(7);
        assert_eq!(doc.kind(p), Some(&NodeKind::Paragraph));
        assert_eq!(doc.kind(NodeId::new(9)), Some(&NodeKind::Bold));
        assert!(doc.children(p)[0].index() >= 10);
    }

    #[test]
    fn unknown_elements_are_unwrapped_and_text_merged() {
        let doc = parse_from_html("<body><p>a<span>b</span>c</p></body>").unwrap();
        let p = doc.children(NodeId::ROOT)[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn annotations_come_from_the_bundle_when_not_inline() {
        let parsoid: IdMap = [("mw1".to_string(), json!({"dsr": [0, 1, 0, 0]}))].into();
        let mw: IdMap = [("mw42".to_string(), json!({"x": 1}))].into();
        let external = ExternalData {
            parsoid: Some(&parsoid),
            mw: Some(&mw),
            content_model: None,
        };
        let parsed = read_html(r#"<body id="mw0"><p id="mw1">a</p></body>"#, external).unwrap();
        assert_eq!(parsed.orphans, 1);
        assert!(parsed.document.dsr(NodeId::new(1)).is_some());
        assert!(parsed.document.annotations().bag(NodeId::new(42)).is_none());
    }

    #[test]
    fn bad_inline_json_is_reported_not_fatal() {
        let parsed = read_html(
            r#"<body><p id="mw1" data-parsoid="{oops">a</p></body>"#,
            ExternalData::default(),
        )
        .unwrap();
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.document.text_content(NodeId::ROOT), "a");
    }

    #[test]
    fn whitespace_between_blocks_is_ignored() {
        let doc = parse_from_html("<body>\n<p>a</p>\n<ul>\n<li>x</li>\n</ul>\n</body>").unwrap();
        assert_eq!(doc.children(NodeId::ROOT).len(), 2);
    }

    #[test]
    fn content_model_comes_from_the_head() {
        let html = r#"<html><head><meta property="mw:contentModel" content="css"></head><body><div class="mw-code">a{}</div></body></html>"#;
        let doc = parse_from_html(html).unwrap();
        assert_eq!(doc.content_model(), "css");
        assert_eq!(doc.text_content(NodeId::ROOT), "a{}");
    }
}
