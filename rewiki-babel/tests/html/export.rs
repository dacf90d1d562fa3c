//! Export tests for HTML format (wikitext → HTML)

use insta::assert_snapshot;
use rewiki_babel::format::Format;
use rewiki_babel::formats::html::{serialize_body, HtmlFormat, HtmlOptions};
use rewiki_babel::transforms::{TransformOptions, TransformationEngine, WikitextEngine};
use rewiki_babel::{Document, MessageCatalog};
use std::sync::Arc;

fn to_doc(src: &str) -> Document {
    WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default())
}

fn bare_body(src: &str) -> String {
    serialize_body(&to_doc(src), &HtmlOptions::default().with_inline_data(false)).unwrap()
}

#[test]
fn test_block_structure() {
    assert_snapshot!(
        bare_body("== Head ==\n* one\n* two\n----"),
        @r#"<body id="mw0" class="mw-parser-output"><h2 id="mw1">Head</h2><ul id="mw3"><li id="mw4">one</li><li id="mw6">two</li></ul><hr id="mw8"></body>"#
    );
}

#[test]
fn test_ordered_list_and_levels() {
    let html = bare_body("==== Deep ====\n# a\n# b\n");
    assert!(html.contains("<h4 id=\"mw1\">Deep</h4>"));
    assert!(html.contains("<ol id=\"mw3\">"));
}

#[test]
fn test_inline_markup() {
    let html = bare_body("'''bold''' and ''italic'' and <nowiki>[[raw]]</nowiki>");
    assert!(html.contains("<b id=\"mw2\">bold</b>"));
    assert!(html.contains("<i id=\"mw5\">italic</i>"));
    assert!(html.contains("<span id=\"mw8\" typeof=\"mw:Nowiki\">[[raw]]</span>"));
}

#[test]
fn test_link_href_is_encoded() {
    let html = bare_body("[[main page|home]]");
    assert!(html.contains(r#"rel="mw:WikiLink" href="./Main_page" title="Main page">home</a>"#));
}

#[test]
fn test_messages_come_from_the_localizer() {
    let catalog: MessageCatalog = [(
        "template-expansion-unavailable",
        "Vorlage $1 nicht verfügbar",
    )]
    .into_iter()
    .collect();
    let options = HtmlOptions::default()
        .with_inline_data(false)
        .with_localizer(Arc::new(catalog));
    let html = serialize_body(&to_doc("{{Infobox}}"), &options).unwrap();
    assert!(html.contains(">Vorlage Template:Infobox nicht verfügbar</span>"));
}

#[test]
fn test_format_serialize_writes_a_full_page() {
    let format = HtmlFormat::new(HtmlOptions::default().with_title("Greeting"));
    let html = format.serialize(&to_doc("Hello")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Greeting</title>"));
    assert!(html.contains(r#"<meta property="mw:htmlVersion" content="2.8.0">"#));
    assert!(html.contains("data-parsoid="));
}
