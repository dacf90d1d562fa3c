//! HTML format implementation
//!
//! Converts documents to and from annotated HTML5.
//!
//! # Library Choice
//!
//! We use the `html5ever` + `markup5ever_rcdom` pair for both directions:
//! - `html5ever`: browser-grade HTML5 parser and serializer
//! - `markup5ever_rcdom`: reference-counted DOM tree to build and walk
//!
//! Malformed input is repaired by the parser the way a browser would, so
//! reading HTML back never fails on markup errors.
//!
//! # Element Mapping Table
//!
//! | Node kind       | HTML                                                   | Import notes                            |
//! |-----------------|--------------------------------------------------------|-----------------------------------------|
//! | Root            | `<body id="mw0" class="mw-parser-output">`             | Only `<body>` is read                   |
//! | Paragraph       | `<p>`                                                  |                                         |
//! | Heading         | `<h1>`..`<h6>`                                         |                                         |
//! | List            | `<ul>` / `<ol>`                                        | Whitespace between items is dropped     |
//! | ListItem        | `<li>`                                                 |                                         |
//! | HorizontalRule  | `<hr>`                                                 |                                         |
//! | Preformatted    | `<div class="mw-code">`                                | `<pre>` is accepted too                 |
//! | Bold / Italic   | `<b>` / `<i>`                                          | `<strong>` / `<em>` accepted            |
//! | WikiLink        | `<a rel="mw:WikiLink" href="./Title" title="Title">`   | Target read from `href`                 |
//! | Transclusion    | `<span typeof="mw:Transclusion">`                      | Target read from `data-mw.template`     |
//! | Unparsed        | `<span typeof="mw:Error" title="...">`                 | Text content only                       |
//! | Nowiki          | `<span typeof="mw:Nowiki">`                            | Text content only                       |
//! | Text            | text node                                              | Adjacent runs are merged                |
//!
//! Every element carries `id="mwN"`, the id of its node. Annotations are
//! written inline as `data-parsoid` / `data-mw` JSON attributes, or left
//! out for a page bundle to carry (see [`crate::formats::pagebundle`]).
//!
//! Error envelopes on Unparsed and Transclusion nodes are rendered with the
//! configured localizer and shown in place: as the `title` of the error
//! span, and as the visible text of a transclusion that could not be
//! expanded.

pub mod parser;
pub mod serializer;

pub use parser::{parse_from_html, read_html, ExternalData, IdMap, ParsedHtml};
pub use serializer::{serialize_body, serialize_to_html, HtmlOptions, DEFAULT_HTML_VERSION};

use crate::error::FormatError;
use crate::format::{bool_option, check_options, Format};
use crate::ir::Document;
use std::collections::HashMap;

/// Format implementation for annotated HTML
#[derive(Debug, Clone, Default)]
pub struct HtmlFormat {
    options: HtmlOptions,
}

impl HtmlFormat {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HtmlOptions {
        &self.options
    }
}

impl Format for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn description(&self) -> &str {
        "Annotated HTML5 with data-parsoid/data-mw attributes"
    }

    fn file_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Document, FormatError> {
        parse_from_html(source)
    }

    fn serialize(&self, doc: &Document) -> Result<String, FormatError> {
        serialize_to_html(doc, &self.options)
    }

    /// Accepts `version`, `title` and `inline-data`.
    fn serialize_with_options(
        &self,
        doc: &Document,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        check_options(self.name(), options, &["version", "title", "inline-data"])?;
        let mut html_options = self.options.clone();
        if let Some(version) = options.get("version") {
            html_options.version = version.clone();
        }
        if let Some(title) = options.get("title") {
            html_options.title = Some(title.clone());
        }
        html_options.inline_data = bool_option(options, "inline-data", html_options.inline_data)?;
        serialize_to_html(doc, &html_options)
    }
}
