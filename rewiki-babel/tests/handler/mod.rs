//! Requests from resolution through negotiation to the response body.

use rewiki_babel::annotations::Namespace;
use rewiki_babel::formats::html::read_html;
use rewiki_babel::formats::html::ExternalData;
use rewiki_babel::formats::pagebundle::PageBundle;
use rewiki_babel::handler::CONTENT_MODEL_HEADER;
use rewiki_babel::transforms::ConversionState;
use rewiki_babel::{
    CodecValue, ContentVersion, ErrorCode, HandlerSettings, InMemoryContentSource, NodeId,
    NodeKind, Request, RequestBody, RequestHandler,
};
use std::sync::Arc;

const PAGES: &str = include_str!("fixtures/pages.json");
const DOMAIN: &str = "en.wiki.test";

fn handler_with(settings: HandlerSettings) -> RequestHandler {
    let store = InMemoryContentSource::from_json(PAGES).unwrap();
    RequestHandler::new(Arc::new(store), settings)
}

fn handler() -> RequestHandler {
    handler_with(HandlerSettings::default())
}

fn v(s: &str) -> ContentVersion {
    s.parse().unwrap()
}

#[test]
fn test_pagebundle_for_explicit_revision() {
    let response = handler()
        .handle(&Request::new(DOMAIN, "Greeting", "pagebundle").with_revision("1"))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.state, Some(ConversionState::Completed));
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));

    let bundle = PageBundle::from_json(&response.body_text()).unwrap();
    let parsed = bundle.to_document().unwrap();
    let doc = parsed.document;
    assert_eq!(doc.error_count(), 0);

    let link = doc
        .descendants(NodeId::ROOT)
        .find(|id| matches!(doc.kind(*id), Some(NodeKind::WikiLink { .. })))
        .unwrap();
    let target = doc
        .annotation(link, Namespace::Mw, "target")
        .and_then(CodecValue::as_title)
        .unwrap();
    assert_eq!(target.text(), "World");
}

#[test]
fn test_latest_revision_reports_unexpanded_templates() {
    let response = handler()
        .handle(&Request::new(DOMAIN, "Greeting", "html"))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.state, Some(ConversionState::CompletedWithErrors));
    let parsed = read_html(&response.body_text(), ExternalData::default()).unwrap();
    let keys: Vec<_> = parsed
        .document
        .collect_errors()
        .map(|(_, e)| e.key().to_string())
        .collect();
    assert_eq!(keys, ["template-expansion-unavailable"]);
}

#[test]
fn test_titles_are_normalized_before_lookup() {
    let response = handler()
        .handle(&Request::new(DOMAIN, "main_Page", "wikitext"))
        .unwrap();
    assert_eq!(
        response.body_text(),
        "== Welcome ==\nThis is the [[main page]].\n"
    );
    assert_eq!(response.header(CONTENT_MODEL_HEADER), Some("wikitext"));
}

#[test]
fn test_missing_content_has_distinct_codes() {
    let cases = [
        (Request::new(DOMAIN, "Nowhere", "html"), ErrorCode::PageMissing),
        (
            Request::new(DOMAIN, "Greeting", "html").with_revision("999999"),
            ErrorCode::RevisionMissing,
        ),
        (
            Request::new(DOMAIN, "Greeting", "html").with_slot("style"),
            ErrorCode::SlotMissing,
        ),
        (Request::new("fr.wiki.test", "Greeting", "html"), ErrorCode::PageMissing),
    ];
    for (request, code) in cases {
        let err = handler().handle(&request).unwrap_err();
        assert_eq!(err.code, code, "{request:?}");
        assert_eq!(err.status, 404);
        assert_eq!(err.to_json()["code"], code.as_str());
    }
}

#[test]
fn test_bad_input_is_rejected_before_conversion() {
    let err = handler()
        .handle(&Request::new(DOMAIN, "Greeting", "html").with_revision("first"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);

    let err = handler()
        .handle(&Request::new(DOMAIN, "a{b", "html"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
    assert_eq!(err.status, 400);
}

#[test]
fn test_version_negotiation() {
    let settings = HandlerSettings {
        supported_versions: vec![v("1.0.0"), v("2.0.0")],
        ..HandlerSettings::default()
    };
    let handler = handler_with(settings);
    let request = |accept: Vec<ContentVersion>| {
        Request::new(DOMAIN, "Main Page", "html").with_accept(accept)
    };

    let got = handler.handle(&request(vec![v("2.0.0"), v("1.0.0")])).unwrap();
    assert_eq!(got.version, Some(v("2.0.0")));
    let got = handler.handle(&request(vec![v("1.0.0"), v("2.0.0")])).unwrap();
    assert_eq!(got.version, Some(v("1.0.0")));
    let got = handler.handle(&request(vec![v("3.0.0")])).unwrap();
    assert_eq!(got.version, Some(v("2.0.0")));
    assert!(got.body_text().contains(r#"content="2.0.0""#));

    let err = handler.handle(&request(vec![v("0.5.0")])).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotAcceptable);
    assert_eq!(err.status, 406);
}

#[test]
fn test_unsupported_format() {
    let err = handler()
        .handle(&Request::new(DOMAIN, "Greeting", "markdown"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedFormat);
    assert_eq!(err.to_json()["status"], 404);
}

#[test]
fn test_edited_html_back_to_markup() {
    let handler = handler();
    let html = handler
        .handle(&Request::new(DOMAIN, "Main Page", "html").with_revision("10"))
        .unwrap()
        .body_text();
    let edited = html.replace("Welcome", "Hello");

    let response = handler
        .handle(
            &Request::new(DOMAIN, "Main Page", "wikitext")
                .with_revision("10")
                .with_body(RequestBody::Html(edited)),
        )
        .unwrap();
    assert_eq!(
        response.body_text(),
        "== Hello ==\nThis is the [[main page]].\n"
    );
}

#[test]
fn test_markup_body_to_pagebundle_needs_no_page() {
    let response = handler()
        .handle(
            &Request::new(DOMAIN, "Does not exist", "pagebundle")
                .with_body(RequestBody::Wikitext(b"''fresh''".to_vec())),
        )
        .unwrap();
    assert_eq!(response.status, 200);
    let bundle = PageBundle::from_json(&response.body_text()).unwrap();
    assert!(bundle.html.contains("<i id=\"mw2\">fresh</i>"));
}
