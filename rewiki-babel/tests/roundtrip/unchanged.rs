//! Unedited documents serialize back to their exact source.

use rewiki_babel::formats::html::{read_html, serialize_to_html, ExternalData, HtmlOptions};
use rewiki_babel::formats::pagebundle::PageBundle;
use rewiki_babel::transforms::{TransformOptions, TransformationEngine, WikitextEngine};

const KITCHENSINK: &str = include_str!("fixtures/kitchensink.wiki");

fn to_doc(src: &str) -> rewiki_babel::Document {
    WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default())
}

fn through_html(src: &[u8]) -> Vec<u8> {
    let doc = WikitextEngine.markup_to_document(src, "wikitext", &TransformOptions::default());
    let html = serialize_to_html(&doc, &HtmlOptions::default()).unwrap();
    let parsed = read_html(&html, ExternalData::default()).unwrap();
    WikitextEngine.document_to_markup(&parsed.document, Some(src))
}

#[test]
fn test_document_round_trip() {
    let doc = to_doc(KITCHENSINK);
    let out = WikitextEngine.document_to_markup(&doc, Some(KITCHENSINK.as_bytes()));
    assert_eq!(String::from_utf8(out).unwrap(), KITCHENSINK);
}

#[test]
fn test_html_round_trip() {
    let doc = to_doc(KITCHENSINK);
    let html = serialize_to_html(&doc, &HtmlOptions::default()).unwrap();
    let parsed = read_html(&html, ExternalData::default()).unwrap();
    assert!(parsed.issues.is_empty());

    let out = WikitextEngine.document_to_markup(&parsed.document, Some(KITCHENSINK.as_bytes()));
    assert_eq!(String::from_utf8(out).unwrap(), KITCHENSINK);
}

#[test]
fn test_pagebundle_round_trip() {
    let doc = to_doc(KITCHENSINK);
    let json = PageBundle::from_document(&doc, &HtmlOptions::default())
        .unwrap()
        .to_json()
        .unwrap();
    let parsed = PageBundle::from_json(&json).unwrap().to_document().unwrap();
    assert_eq!(parsed.orphans, 0);
    assert_eq!(parsed.document.annotations(), doc.annotations());

    let out = WikitextEngine.document_to_markup(&parsed.document, Some(KITCHENSINK.as_bytes()));
    assert_eq!(String::from_utf8(out).unwrap(), KITCHENSINK);
}

#[test]
fn test_kitchensink_errors() {
    let doc = to_doc(KITCHENSINK);
    let keys: Vec<&str> = doc.collect_errors().map(|(_, e)| e.key()).collect();
    assert_eq!(
        keys,
        vec![
            "template-expansion-unavailable",
            "bad-title",
            "bad-title",
        ]
    );
}

#[test]
fn test_crlf_survives_html() {
    let src = "Hello [[World]]\r\nsecond line\r\n\r\n== H ==\r\n* a\r\n";
    assert_eq!(String::from_utf8(through_html(src.as_bytes())).unwrap(), src);
}

#[test]
fn test_nul_survives_html() {
    for src in ["a\0b", "\0", "x ''\0'' [[Link|\0]]\n\n== \0 ==\n"] {
        assert_eq!(String::from_utf8(through_html(src.as_bytes())).unwrap(), src);
    }
}

#[test]
fn test_invalid_utf8_survives_html_and_pagebundle() {
    let src: &[u8] = b"ok \xff here\n\n* \xe2\x82 item\n";
    assert_eq!(through_html(src), src);

    let doc = WikitextEngine.markup_to_document(src, "wikitext", &TransformOptions::default());
    let json = PageBundle::from_document(&doc, &HtmlOptions::default())
        .unwrap()
        .to_json()
        .unwrap();
    let parsed = PageBundle::from_json(&json).unwrap().to_document().unwrap();
    assert_eq!(WikitextEngine.document_to_markup(&parsed.document, Some(src)), src);
}
