//! Document → annotated HTML
//!
//! Builds an rcdom tree for the body, serializes it with html5ever, then
//! wraps it in a fixed document shell carrying the HTML version.

use crate::annotations::{Localizer, MessageCatalog, Namespace};
use crate::codec::Codec;
use crate::error::FormatError;
use crate::ir::{Document, NodeId, NodeKind};
use html5ever::{
    ns, serialize, serialize::SerializeOpts, serialize::TraversalScope, Attribute, LocalName,
    QualName,
};
use markup5ever_rcdom::{Handle, Node, NodeData, SerializableHandle};
use std::cell::{Cell, RefCell};
use std::default::Default;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Newest HTML version this serializer writes.
pub const DEFAULT_HTML_VERSION: &str = "2.8.0";

/// Options for HTML serialization
#[derive(Clone)]
pub struct HtmlOptions {
    /// Value of the `mw:htmlVersion` meta element
    pub version: String,
    /// Document title; empty when not set
    pub title: Option<String>,
    /// Write annotations as `data-parsoid` / `data-mw` attributes
    pub inline_data: bool,
    /// Renders error envelopes shown in place of broken content
    pub localizer: Arc<dyn Localizer>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_HTML_VERSION.to_string(),
            title: None,
            inline_data: true,
            localizer: Arc::new(MessageCatalog::new()),
        }
    }
}

impl fmt::Debug for HtmlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlOptions")
            .field("version", &self.version)
            .field("title", &self.title)
            .field("inline_data", &self.inline_data)
            .finish_non_exhaustive()
    }
}

impl HtmlOptions {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_inline_data(mut self, inline_data: bool) -> Self {
        self.inline_data = inline_data;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }
}

/// Serialize a document to a complete HTML page.
pub fn serialize_to_html(doc: &Document, options: &HtmlOptions) -> Result<String, FormatError> {
    let body = serialize_body(doc, options)?;
    Ok(wrap_in_document(&body, doc.content_model(), options))
}

/// Serialize only the `<body>` element.
pub fn serialize_body(doc: &Document, options: &HtmlOptions) -> Result<String, FormatError> {
    let builder = DomBuilder {
        doc,
        options,
        codec: Codec::new(),
    };
    let body = builder.element_for(NodeId::ROOT).ok_or_else(|| {
        FormatError::SerializationError("document has no root".to_string())
    })?;
    serialize_handle(&body)
}

struct DomBuilder<'a> {
    doc: &'a Document,
    options: &'a HtmlOptions,
    codec: Codec,
}

impl DomBuilder<'_> {
    fn element_for(&self, id: NodeId) -> Option<Handle> {
        let kind = self.doc.kind(id)?;
        let mut attrs: Vec<(&str, String)> = Vec::new();
        if id != NodeId::ROOT && !kind.is_text() {
            attrs.push(("id", id.html_id()));
        }
        let tag = match kind {
            NodeKind::Text(text) => return Some(create_text(text)),
            NodeKind::Root => {
                attrs.push(("id", id.html_id()));
                attrs.push(("class", "mw-parser-output".to_string()));
                "body".to_string()
            }
            NodeKind::Paragraph => "p".to_string(),
            NodeKind::Heading { level } => format!("h{}", (*level).clamp(1, 6)),
            NodeKind::List { ordered: true } => "ol".to_string(),
            NodeKind::List { ordered: false } => "ul".to_string(),
            NodeKind::ListItem => "li".to_string(),
            NodeKind::HorizontalRule => "hr".to_string(),
            NodeKind::Preformatted => {
                attrs.push(("class", "mw-code".to_string()));
                "div".to_string()
            }
            NodeKind::Bold => "b".to_string(),
            NodeKind::Italic => "i".to_string(),
            NodeKind::WikiLink { target } => {
                attrs.push(("rel", "mw:WikiLink".to_string()));
                attrs.push(("href", target.href()));
                attrs.push(("title", target.text().to_string()));
                "a".to_string()
            }
            NodeKind::Transclusion { .. } => {
                attrs.push(("typeof", self.typeof_for(id, "mw:Transclusion")));
                "span".to_string()
            }
            NodeKind::Unparsed => {
                attrs.push(("typeof", "mw:Error".to_string()));
                "span".to_string()
            }
            NodeKind::Nowiki => {
                attrs.push(("typeof", "mw:Nowiki".to_string()));
                "span".to_string()
            }
        };

        let rendered_errors = self.rendered_errors(id);
        if matches!(kind, NodeKind::Unparsed | NodeKind::Transclusion { .. }) {
            if let Some(text) = &rendered_errors {
                attrs.push(("title", text.clone()));
            }
        }
        if self.options.inline_data {
            if let Some(bag) = self.doc.annotations().bag(id) {
                for namespace in [Namespace::Parsoid, Namespace::Mw] {
                    if let Some(tree) = bag.encode_namespace(namespace, &self.codec) {
                        attrs.push((namespace.attribute(), tree.to_string()));
                    }
                }
            }
        }

        let element = create_element(&tag, attrs);
        match kind {
            // The expansion is not available; show the problem instead.
            NodeKind::Transclusion { .. } => {
                if let Some(text) = rendered_errors {
                    append(&element, create_text(&text));
                }
            }
            _ => {
                for child in self.doc.children(id) {
                    if let Some(handle) = self.element_for(*child) {
                        append(&element, handle);
                    }
                }
            }
        }
        Some(element)
    }

    fn typeof_for(&self, id: NodeId, base: &str) -> String {
        if self.doc.annotations().errors(id).is_empty() {
            base.to_string()
        } else {
            format!("{base} mw:Error")
        }
    }

    fn rendered_errors(&self, id: NodeId) -> Option<String> {
        let errors = self.doc.annotations().errors(id);
        if errors.is_empty() {
            return None;
        }
        let rendered: Vec<String> = errors
            .iter()
            .map(|e| e.render(self.options.localizer.as_ref()))
            .collect();
        Some(rendered.join("; "))
    }
}

fn append(parent: &Handle, child: Handle) {
    parent.children.borrow_mut().push(child);
}

/// Create an element node with the given tag and attributes
fn create_element(tag: &str, attrs: Vec<(&str, String)>) -> Handle {
    let qual_name = QualName::new(None, ns!(html), LocalName::from(tag));
    let attributes = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.into(),
        })
        .collect();

    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: qual_name,
            attrs: RefCell::new(attributes),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

fn create_text(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(text.to_string().into()),
        },
    })
}

fn serialize_handle(handle: &Handle) -> Result<String, FormatError> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let serializable = SerializableHandle::from(handle.clone());
    serialize(&mut output, &serializable, opts).map_err(|e| {
        FormatError::SerializationError(format!("HTML serialization failed: {e}"))
    })?;
    String::from_utf8(output)
        .map_err(|e| FormatError::SerializationError(format!("UTF-8 conversion failed: {e}")))
}

fn wrap_in_document(body_html: &str, content_model: &str, options: &HtmlOptions) -> String {
    let escaped_title = html_escape(options.title.as_deref().unwrap_or(""));
    let version = html_escape(&options.version);
    let content_model = html_escape(content_model);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta property="mw:htmlVersion" content="{version}">
  <meta property="mw:contentModel" content="{content_model}">
  <title>{escaped_title}</title>
</head>
{body_html}
</html>"#
    )
}

/// Escape HTML special characters in text
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::wikitext::to_document;

    fn body(src: &str, options: &HtmlOptions) -> String {
        let doc = to_document(src.as_bytes(), "wikitext");
        serialize_body(&doc, options).unwrap()
    }

    #[test]
    fn plain_body_without_data() {
        let options = HtmlOptions::default().with_inline_data(false);
        insta::assert_snapshot!(
            body("Hello [[World]]", &options),
            @r#"<body id="mw0" class="mw-parser-output"><p id="mw1">Hello <a id="mw3" rel="mw:WikiLink" href="./World" title="World">World</a></p></body>"#
        );
    }

    #[test]
    fn inline_data_carries_annotations() {
        let html = body("Hello [[World]]", &HtmlOptions::default());
        assert!(html.contains("data-parsoid="));
        assert!(html.contains("data-mw="));
        assert!(html.contains("&quot;stx&quot;:&quot;simple&quot;"));
    }

    #[test]
    fn errors_render_in_place() {
        let catalog: MessageCatalog = [("bad-title", "Bad title: $1")].into_iter().collect();
        let options = HtmlOptions::default()
            .with_inline_data(false)
            .with_localizer(Arc::new(catalog));
        let html = body("x [[a|b]] [[a{b]]", &options);
        assert!(html.contains(r#"typeof="mw:Error" title="Bad title: a{b">[[a{b]]</span>"#));
    }

    #[test]
    fn transclusion_shows_its_problem() {
        let options = HtmlOptions::default().with_inline_data(false);
        let html = body("{{Infobox}}", &options);
        assert!(html.contains(r#"typeof="mw:Transclusion mw:Error""#));
        assert!(html.contains(">Template Template:Infobox could not be expanded</span>"));
    }

    #[test]
    fn document_shell_carries_version_and_model() {
        let doc = to_document(b"body { color: red }", "css");
        let options = HtmlOptions::default().with_version("2.7.0").with_title("A & B");
        let html = serialize_to_html(&doc, &options).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<meta property="mw:htmlVersion" content="2.7.0">"#));
        assert!(html.contains(r#"<meta property="mw:contentModel" content="css">"#));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains(r#"<div id="mw1" class="mw-code">body { color: red }</div>"#));
    }
}
