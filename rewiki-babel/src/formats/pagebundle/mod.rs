//! Page bundle format
//!
//! A page bundle keeps the HTML free of annotation attributes and carries
//! the annotations next to it, keyed by element id:
//!
//! ```json
//! {
//!   "html": "<!DOCTYPE html>...",
//!   "data-parsoid": { "counter": 4, "ids": { "mw1": { "dsr": [0, 5, 0, 0] } } },
//!   "data-mw": { "ids": { "mw3": { "target": { "_type_": "title", "text": "World" } } } },
//!   "version": "2.8.0",
//!   "contentmodel": "wikitext"
//! }
//! ```
//!
//! `counter` is the highest node id handed out when the bundle was written.

use crate::annotations::Namespace;
use crate::codec::Codec;
use crate::error::FormatError;
use crate::format::{check_options, Format};
use crate::formats::html::{read_html, serialize_to_html, ExternalData, HtmlOptions, IdMap, ParsedHtml};
use crate::ir::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsoidData {
    #[serde(default)]
    pub counter: u32,
    #[serde(default)]
    pub ids: IdMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MwData {
    #[serde(default)]
    pub ids: IdMap,
}

/// HTML plus out-of-band annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBundle {
    pub html: String,
    #[serde(rename = "data-parsoid", default)]
    pub parsoid: ParsoidData,
    #[serde(rename = "data-mw", default)]
    pub mw: MwData,
    pub version: String,
    #[serde(rename = "contentmodel")]
    pub content_model: String,
}

impl PageBundle {
    pub fn from_document(doc: &Document, options: &HtmlOptions) -> Result<Self, FormatError> {
        let html_options = options.clone().with_inline_data(false);
        let html = serialize_to_html(doc, &html_options)?;

        let codec = Codec::new();
        let mut parsoid = ParsoidData {
            counter: doc.next_id().index().saturating_sub(1),
            ids: IdMap::new(),
        };
        let mut mw = MwData::default();
        for id in doc.annotations().node_ids() {
            let Some(bag) = doc.annotations().bag(id) else {
                continue;
            };
            if let Some(tree) = bag.encode_namespace(Namespace::Parsoid, &codec) {
                parsoid.ids.insert(id.html_id(), tree);
            }
            if let Some(tree) = bag.encode_namespace(Namespace::Mw, &codec) {
                mw.ids.insert(id.html_id(), tree);
            }
        }

        Ok(Self {
            html,
            parsoid,
            mw,
            version: options.version.clone(),
            content_model: doc.content_model().to_string(),
        })
    }

    /// Read the bundle back into a document.
    pub fn to_document(&self) -> Result<ParsedHtml, FormatError> {
        let external = ExternalData {
            parsoid: Some(&self.parsoid.ids),
            mw: Some(&self.mw.ids),
            content_model: Some(&self.content_model),
        };
        let mut parsed = read_html(&self.html, external)?;
        parsed.version.get_or_insert_with(|| self.version.clone());
        Ok(parsed)
    }

    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        serde_json::from_str(json)
            .map_err(|e| FormatError::ParseError(format!("Invalid page bundle: {e}")))
    }

    pub fn to_json(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FormatError::SerializationError(format!("Page bundle: {e}")))
    }
}

/// Format implementation for page bundles
#[derive(Debug, Clone, Default)]
pub struct PageBundleFormat {
    options: HtmlOptions,
}

impl PageBundleFormat {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }
}

impl Format for PageBundleFormat {
    fn name(&self) -> &str {
        "pagebundle"
    }

    fn description(&self) -> &str {
        "JSON page bundle: HTML with out-of-band annotations"
    }

    fn file_extensions(&self) -> &[&str] {
        &["json"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Document, FormatError> {
        Ok(PageBundle::from_json(source)?.to_document()?.document)
    }

    fn serialize(&self, doc: &Document) -> Result<String, FormatError> {
        PageBundle::from_document(doc, &self.options)?.to_json()
    }

    /// Accepts `version` and `title`.
    fn serialize_with_options(
        &self,
        doc: &Document,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        check_options(self.name(), options, &["version", "title"])?;
        let mut html_options = self.options.clone();
        if let Some(version) = options.get("version") {
            html_options.version = version.clone();
        }
        if let Some(title) = options.get("title") {
            html_options.title = Some(title.clone());
        }
        PageBundle::from_document(doc, &html_options)?.to_json()
    }
}
