//! Import tests for HTML format (HTML from other tools → wikitext)

use rewiki_babel::error::FormatError;
use rewiki_babel::formats::html::parse_from_html;
use rewiki_babel::transforms::{TransformationEngine, WikitextEngine};
use rewiki_babel::{NodeId, NodeKind};

fn to_markup(html: &str) -> String {
    let doc = parse_from_html(html).unwrap();
    String::from_utf8(WikitextEngine.document_to_markup(&doc, None)).unwrap()
}

#[test]
fn test_foreign_html_becomes_fresh_markup() {
    let html = concat!(
        "<body><h2>Intro</h2>",
        "<p>Some <strong>bold</strong> and <em>slanted</em> <a href=\"./Main_Page\">home</a>.</p>",
        "<ul><li>one</li><li>two</li></ul></body>"
    );
    assert_eq!(
        to_markup(html),
        "== Intro ==\nSome '''bold''' and ''slanted'' [[Main Page|home]].\n* one\n* two"
    );
}

#[test]
fn test_unknown_wrappers_are_dropped() {
    let html = "<body><p><span class=\"x\">keep</span> <font>me</font><script>drop()</script></p></body>";
    let doc = parse_from_html(html).unwrap();
    let para = doc.children(NodeId::ROOT)[0];
    assert_eq!(doc.children(para).len(), 1);
    assert_eq!(doc.text_content(para), "keep me");
}

#[test]
fn test_links_without_a_title_are_unwrapped() {
    let doc = parse_from_html("<p><a href=\"./a{b\">odd</a> link</p>").unwrap();
    assert!(doc
        .descendants(NodeId::ROOT)
        .all(|id| !matches!(doc.kind(id), Some(NodeKind::WikiLink { .. }))));
    assert_eq!(doc.text_content(NodeId::ROOT), "odd link");
}

#[test]
fn test_markup_lookalikes_are_escaped() {
    assert_eq!(
        to_markup("<p>use [[brackets]] here</p>"),
        "<nowiki>use [[brackets]] here</nowiki>"
    );
}

#[test]
fn test_out_of_range_ids_are_treated_as_foreign() {
    let doc = parse_from_html(r#"<body><p id="mw4294967295">hi</p></body>"#).unwrap();
    let para = doc.children(NodeId::ROOT)[0];
    assert_eq!(para, NodeId::new(1));
    assert_eq!(doc.text_content(para), "hi");
}

#[test]
fn test_exhausted_id_space_is_a_parse_error() {
    let err = parse_from_html(r#"<body><p id="mw4294967294">hi</p></body>"#).unwrap_err();
    assert!(matches!(err, FormatError::ParseError(_)));
    assert!(err.to_string().contains("no node ids left"));
}
