//! Round-trip laws over generated markup.

use proptest::prelude::*;
use rewiki_babel::formats::html::{read_html, serialize_to_html, ExternalData, HtmlOptions};
use rewiki_babel::transforms::{TransformOptions, TransformationEngine, WikitextEngine};

const MARKUP: &str = "[a-zA-Z '\\[\\]{}|=*#\\-\n\r]{0,120}";

proptest! {
    #[test]
    fn unmodified_documents_round_trip(src in MARKUP) {
        let doc = WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default());
        let out = WikitextEngine.document_to_markup(&doc, Some(src.as_bytes()));
        prop_assert_eq!(String::from_utf8(out).unwrap(), src);
    }

    #[test]
    fn unmodified_html_round_trips(src in MARKUP) {
        let doc = WikitextEngine.markup_to_document(src.as_bytes(), "wikitext", &TransformOptions::default());
        let html = serialize_to_html(&doc, &HtmlOptions::default()).unwrap();
        let parsed = read_html(&html, ExternalData::default()).unwrap();
        prop_assert!(parsed.issues.is_empty());
        let out = WikitextEngine.document_to_markup(&parsed.document, Some(src.as_bytes()));
        prop_assert_eq!(String::from_utf8(out).unwrap(), src);
    }
}
