//! Wikitext format implementation
//!
//! A small reference engine for the wiki markup dialect: enough grammar to
//! exercise round-tripping end to end, not a full MediaWiki parser.
//!
//! # Element Mapping Table
//!
//! | Wikitext              | Node kind          | Round-trip hints (`data-parsoid`)  | Semantic data (`data-mw`) |
//! |-----------------------|--------------------|------------------------------------|---------------------------|
//! | `== Title ==`         | Heading            | `dsr` (open/close include spaces)  |                           |
//! | `* item` / `# item`   | List + ListItem    | `dsr` (open = bullet + spaces)     |                           |
//! | `----`                | HorizontalRule     | `dsr`                              |                           |
//! | other lines           | Paragraph          | `dsr`                              |                           |
//! | `'''x'''` / `''x''`   | Bold / Italic      | `dsr`                              |                           |
//! | `[[T]]`, `[[T\|l]]`   | WikiLink           | `dsr`, `stx`, `sa.href`            | `target` (title)          |
//! | `{{T\|...}}`          | Transclusion       | `dsr`, `src`                       | `template` (title)        |
//! | `<nowiki>x</nowiki>`  | Nowiki             | `dsr`                              |                           |
//! | broken link/template  | Unparsed           | `dsr`, `src`                       | `errors`                  |
//!
//! # Node-local errors
//!
//! Conversion never aborts. Problems end up as error envelopes on the node
//! they concern (see [`messages`]).
//!
//! # Limitations
//!
//! - Lists are single level; `**` is a bullet followed by a literal `*`.
//! - Inline markup other than `<nowiki>` does not span lines.
//! - Line endings are `\n`; a `\r` is kept as ordinary text.
//! - Invalid UTF-8 reads as U+FFFD. Unedited spans serialize back to the
//!   original bytes; edited text is written as UTF-8.

pub mod parser;
pub mod serializer;

pub use parser::{mark_unexpanded_transclusions, parse_wikitext, SourceText};
pub use serializer::serialize_wikitext;

use crate::error::FormatError;
use crate::format::{check_options, Format};
use crate::ir::Document;
use std::collections::HashMap;

/// Content model of wiki markup.
pub const WIKITEXT_MODEL: &str = "wikitext";

/// Content models shown verbatim.
pub const TEXT_MODELS: &[&str] = &["text", "css", "javascript", "json"];

/// Message keys of the envelopes the engine records.
pub mod messages {
    pub const BAD_TITLE: &str = "bad-title";
    pub const TEMPLATE_EXPANSION_UNAVAILABLE: &str = "template-expansion-unavailable";
    pub const INVALID_UTF8: &str = "invalid-utf8";
    pub const UNSUPPORTED_CONTENT_MODEL: &str = "unsupported-content-model";
}

pub fn is_text_model(content_model: &str) -> bool {
    TEXT_MODELS.contains(&content_model)
}

/// Full markup → document pipeline: parse, then the transclusion pass.
pub fn to_document(content: &[u8], content_model: &str) -> Document {
    let mut doc = parse_wikitext(content, content_model);
    mark_unexpanded_transclusions(&mut doc);
    doc
}

/// Format implementation for wikitext
pub struct WikitextFormat;

impl Format for WikitextFormat {
    fn name(&self) -> &str {
        "wikitext"
    }

    fn description(&self) -> &str {
        "MediaWiki wikitext markup"
    }

    fn file_extensions(&self) -> &[&str] {
        &["wiki", "wikitext"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Document, FormatError> {
        Ok(to_document(source.as_bytes(), WIKITEXT_MODEL))
    }

    fn serialize(&self, doc: &Document) -> Result<String, FormatError> {
        into_string(serialize_wikitext(doc, None))
    }

    /// Accepts `original`: the source the document was converted from.
    fn serialize_with_options(
        &self,
        doc: &Document,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        check_options(self.name(), options, &["original"])?;
        let original = options.get("original").map(String::as_bytes);
        into_string(serialize_wikitext(doc, original))
    }
}

fn into_string(markup: Vec<u8>) -> Result<String, FormatError> {
    String::from_utf8(markup).map_err(|e| FormatError::SerializationError(e.to_string()))
}
