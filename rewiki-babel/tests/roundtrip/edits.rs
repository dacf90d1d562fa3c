//! Edited documents change only the edited spans.

use rewiki_babel::formats::html::{read_html, serialize_to_html, ExternalData, HtmlOptions};
use rewiki_babel::formats::pagebundle::PageBundle;
use rewiki_babel::transforms::{TransformOptions, TransformationEngine, WikitextEngine};
use rewiki_babel::{Document, NodeId, NodeKind};

const KITCHENSINK: &str = include_str!("fixtures/kitchensink.wiki");

fn to_doc(src: &str) -> Document {
    WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default())
}

fn to_markup(doc: &Document, original: &str) -> String {
    String::from_utf8(WikitextEngine.document_to_markup(doc, Some(original.as_bytes()))).unwrap()
}

fn find(doc: &Document, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
    doc.descendants(NodeId::ROOT)
        .find(|id| doc.kind(*id).is_some_and(&pred))
        .expect("node not found")
}

#[test]
fn test_relabelled_link_through_html() {
    let src = "Hello [[World]]\n\nSecond paragraph with '''bold'''.\n";
    let doc = to_doc(src);
    let html = serialize_to_html(&doc, &HtmlOptions::default()).unwrap();
    assert_eq!(html.matches(">World</a>").count(), 1);

    let edited = html.replace(">World</a>", ">Earth</a>");
    let parsed = read_html(&edited, ExternalData::default()).unwrap();
    assert_eq!(
        to_markup(&parsed.document, src),
        "Hello [[World|Earth]]\n\nSecond paragraph with '''bold'''.\n"
    );
}

#[test]
fn test_text_edit_in_list_item() {
    let mut doc = to_doc(KITCHENSINK);
    let node = find(&doc, |k| {
        k.text().is_some_and(|t| t.contains("first bullet"))
    });
    let text = doc.kind(node).and_then(NodeKind::text).unwrap().to_string();
    doc.set_text(node, text.replace("first bullet", "first item"))
        .unwrap();

    assert_eq!(
        to_markup(&doc, KITCHENSINK),
        KITCHENSINK.replace("first bullet", "first item")
    );
}

#[test]
fn test_removed_inline_node() {
    let mut doc = to_doc(KITCHENSINK);
    let bold = find(&doc, |k| matches!(k, NodeKind::Bold));
    doc.remove(bold).unwrap();

    assert_eq!(
        to_markup(&doc, KITCHENSINK),
        KITCHENSINK.replacen("'''bold'''", "", 1)
    );
}

#[test]
fn test_removed_node_takes_its_errors_along() {
    let mut doc = to_doc(KITCHENSINK);
    assert_eq!(doc.error_count(), 3);

    let broken = find(&doc, |k| matches!(k, NodeKind::Unparsed));
    let removed = doc.remove(broken).unwrap();
    assert!(removed.contains(&broken));
    assert_eq!(doc.error_count(), 2);
    assert!(doc.collect_errors().all(|(id, _)| id != broken));
    assert!(doc.annotations().bag(broken).is_none());

    let bundle = PageBundle::from_document(&doc, &HtmlOptions::default()).unwrap();
    assert!(!bundle.parsoid.ids.contains_key(&broken.html_id()));
    assert!(!bundle.mw.ids.contains_key(&broken.html_id()));

    let parsed = bundle.to_document().unwrap();
    assert_eq!(parsed.orphans, 0);
    assert_eq!(parsed.document.error_count(), 2);
}

#[test]
fn test_stale_bundle_entries_are_dropped() {
    let doc = to_doc("a [[b]] c");
    let mut bundle = PageBundle::from_document(&doc, &HtmlOptions::default()).unwrap();
    bundle
        .mw
        .ids
        .insert("mw99".to_string(), serde_json::json!({"errors": [{"key": "gone"}]}));

    let parsed = bundle.to_document().unwrap();
    assert_eq!(parsed.orphans, 1);
    assert_eq!(parsed.document.error_count(), 0);
}
