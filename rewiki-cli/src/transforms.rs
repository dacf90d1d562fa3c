//! CLI-specific transforms
//!
//! Views used by `rewiki inspect` to look at a document the way the
//! converter sees it:
//!
//! - `dom-treeviz`: the node tree with ids, one node per line
//! - `annotations-json`: both annotation namespaces keyed by node id, as they
//!   would travel in a page bundle
//! - `errors`: every error envelope in document order, rendered
//!
//! ## Extra Parameters
//!
//! - `show-dsr`: "true" appends each element's source range to its line in
//!   `dom-treeviz`
//!
//! Example: `rewiki inspect Main_Page.wiki dom-treeviz --extra-show-dsr`

use rewiki_babel::formats::html::HtmlOptions;
use rewiki_babel::formats::pagebundle::PageBundle;
use rewiki_babel::{Document, Localizer, NodeId, NodeKind};
use serde_json::json;
use std::collections::HashMap;

/// All available inspect transforms
pub const AVAILABLE_TRANSFORMS: &[&str] = &["dom-treeviz", "annotations-json", "errors"];

pub const DEFAULT_TRANSFORM: &str = "dom-treeviz";

/// Longest label shown per tree line, in characters.
const LABEL_WIDTH: usize = 30;

/// Run a named transform over an already parsed document.
pub fn execute_transform(
    doc: &Document,
    transform_name: &str,
    extra_params: &HashMap<String, String>,
    localizer: &dyn Localizer,
) -> Result<String, String> {
    match transform_name {
        "dom-treeviz" => {
            let show_dsr = extra_params
                .get("show-dsr")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            Ok(to_treeviz(doc, show_dsr))
        }
        "annotations-json" => {
            let bundle = PageBundle::from_document(doc, &HtmlOptions::default())
                .map_err(|e| format!("Transform failed: {e}"))?;
            let tree = json!({
                "data-parsoid": bundle.parsoid,
                "data-mw": bundle.mw,
            });
            serde_json::to_string_pretty(&tree)
                .map(|mut out| {
                    out.push('\n');
                    out
                })
                .map_err(|e| format!("JSON serialization failed: {e}"))
        }
        "errors" => Ok(errors_report(doc, localizer)),
        _ => Err(format!("Unknown transform: {transform_name}")),
    }
}

fn icon(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Root => "⧉",
        NodeKind::Paragraph => "¶",
        NodeKind::Heading { .. } => "§",
        NodeKind::List { .. } => "☰",
        NodeKind::ListItem => "•",
        NodeKind::HorizontalRule => "⎯",
        NodeKind::Preformatted => "𝒱",
        NodeKind::Text(_) => "◦",
        NodeKind::Bold => "𝐁",
        NodeKind::Italic => "𝐼",
        NodeKind::WikiLink { .. } => "⊕",
        NodeKind::Transclusion { .. } => "{",
        NodeKind::Unparsed => "⚠",
        NodeKind::Nowiki => "∅",
    }
}

fn label(kind: &NodeKind) -> String {
    let full = match kind {
        NodeKind::Text(text) => format!("{text:?}"),
        NodeKind::Heading { level } => format!("heading {level}"),
        NodeKind::List { ordered: true } => "numbered list".to_string(),
        NodeKind::List { ordered: false } => "bullet list".to_string(),
        NodeKind::WikiLink { target } => format!("→ {target}"),
        NodeKind::Transclusion { target } => format!("{{{{{target}}}}}"),
        other => other.name().to_string(),
    };
    truncate(&full)
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= LABEL_WIDTH {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(LABEL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

/// Tree view of the document, root first.
pub fn to_treeviz(doc: &Document, show_dsr: bool) -> String {
    let mut output = String::new();
    output.push_str(&node_line(doc, NodeId::ROOT, show_dsr));
    let children = doc.children(NodeId::ROOT);
    for (index, child) in children.iter().enumerate() {
        format_node(doc, *child, "", index + 1 == children.len(), show_dsr, &mut output);
    }
    output
}

fn node_line(doc: &Document, id: NodeId, show_dsr: bool) -> String {
    let Some(kind) = doc.kind(id) else {
        return String::new();
    };
    let mut line = format!("{} {}", icon(kind), label(kind));
    if !kind.is_text() {
        line.push_str(&format!(" #{id}"));
    }
    if show_dsr {
        if let Some(dsr) = doc.dsr(id) {
            let outer = dsr.outer();
            let inner = dsr.inner();
            line.push_str(&format!(
                " [{}, {}, {}, {}]",
                outer.start,
                outer.end,
                inner.start - outer.start,
                outer.end - inner.end
            ));
        }
    }
    if !doc.annotations().errors(id).is_empty() {
        line.push_str(" !");
    }
    line.push('\n');
    line
}

fn format_node(
    doc: &Document,
    id: NodeId,
    prefix: &str,
    is_last: bool,
    show_dsr: bool,
    output: &mut String,
) {
    let connector = if is_last { "└─" } else { "├─" };
    output.push_str(&format!("{prefix}{connector} {}", node_line(doc, id, show_dsr)));

    let child_prefix = format!("{prefix}{}", if is_last { "  " } else { "│ " });
    let children = doc.children(id);
    for (index, child) in children.iter().enumerate() {
        format_node(
            doc,
            *child,
            &child_prefix,
            index + 1 == children.len(),
            show_dsr,
            output,
        );
    }
}

/// One line per error envelope: node id, key, rendered text.
pub fn errors_report(doc: &Document, localizer: &dyn Localizer) -> String {
    let mut output = String::new();
    for (id, envelope) in doc.collect_errors() {
        output.push_str(&format!(
            "{id}\t{}\t{}\n",
            envelope.key(),
            envelope.render(localizer)
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewiki_babel::transforms::{TransformOptions, TransformationEngine, WikitextEngine};
    use rewiki_babel::MessageCatalog;

    fn doc(src: &str) -> Document {
        WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default())
    }

    #[test]
    fn test_treeviz_shape() {
        let out = to_treeviz(&doc("Hello [[World]]\n* a"), false);
        let expected = concat!(
            "⧉ root #mw0\n",
            "├─ ¶ paragraph #mw1\n",
            "│ ├─ ◦ \"Hello \"\n",
            "│ └─ ⊕ → World #mw3\n",
            "│   └─ ◦ \"World\"\n",
            "└─ ☰ bullet list #mw5\n",
            "  └─ • list-item #mw6\n",
            "    └─ ◦ \"a\"\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_treeviz_marks_errors_and_ranges() {
        let out = to_treeviz(&doc("[[a{b]]"), true);
        assert!(out.contains("⚠ unparsed #mw2 [0, 7, 0, 0] !"));
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let label = truncate(&"x".repeat(40));
        assert_eq!(label.chars().count(), LABEL_WIDTH);
        assert!(label.ends_with('…'));
    }

    #[test]
    fn test_errors_report() {
        let catalog: MessageCatalog = [("bad-title", "Bad title $1")].into_iter().collect();
        let out = execute_transform(
            &doc("x [[a{b]] {{T}}"),
            "errors",
            &HashMap::new(),
            &catalog,
        )
        .unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "mw3\tbad-title\tBad title a{b");
        assert!(lines[1].starts_with("mw6\ttemplate-expansion-unavailable\t"));
    }

    #[test]
    fn test_annotations_json() {
        let out = execute_transform(
            &doc("[[World]]"),
            "annotations-json",
            &HashMap::new(),
            &MessageCatalog::new(),
        )
        .unwrap();
        let tree: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(tree["data-parsoid"]["ids"]["mw2"]["stx"], "simple");
        assert_eq!(tree["data-mw"]["ids"]["mw2"]["target"]["_type_"], "title");
    }

    #[test]
    fn test_unknown_transform() {
        let result = execute_transform(&doc("x"), "ast-tag", &HashMap::new(), &MessageCatalog::new());
        assert!(result.is_err());
    }
}
