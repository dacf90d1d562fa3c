//! Transformation engine boundary
//!
//! The engine turns markup into a [`Document`] and back. Whatever grammar
//! sits behind it, the contract is the same:
//!
//! - `markup_to_document` always returns a document. Problems with one
//!   construct become error envelopes on that construct's node.
//! - `document_to_markup` with the original source reproduces it byte for
//!   byte when the document is unchanged, and changes only edited spans
//!   otherwise.
//!
//! A [`Conversion`] tracks one run: `Pending -> InProgress -> Completed` or
//! `CompletedWithErrors`. There is no failed state; failures that stop a
//! request happen before the engine is reached.

use crate::formats::wikitext::{mark_unexpanded_transclusions, parse_wikitext, serialize_wikitext};
use crate::ir::Document;
use std::fmt;
use thiserror::Error;

/// Options for the markup → document direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Run the pass that flags transclusions nothing can expand.
    pub mark_transclusions: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            mark_transclusions: true,
        }
    }
}

pub trait TransformationEngine: Send + Sync {
    fn markup_to_document(
        &self,
        content: &[u8],
        content_model: &str,
        options: &TransformOptions,
    ) -> Document;

    /// `original` is the source the document was produced from, if known.
    fn document_to_markup(&self, doc: &Document, original: Option<&[u8]>) -> Vec<u8>;
}

/// The built-in engine for the wikitext dialect in [`crate::formats::wikitext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WikitextEngine;

impl TransformationEngine for WikitextEngine {
    fn markup_to_document(
        &self,
        content: &[u8],
        content_model: &str,
        options: &TransformOptions,
    ) -> Document {
        let mut doc = parse_wikitext(content, content_model);
        tracing::debug!(nodes = doc.len(), content_model, "parsed markup");
        if options.mark_transclusions {
            mark_unexpanded_transclusions(&mut doc);
        }
        doc
    }

    fn document_to_markup(&self, doc: &Document, original: Option<&[u8]>) -> Vec<u8> {
        tracing::debug!(selective = original.is_some(), "serializing markup");
        serialize_wikitext(doc, original)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Pending,
    InProgress,
    Completed,
    CompletedWithErrors,
}

impl ConversionState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithErrors)
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed-with-errors",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("cannot move a conversion from {from} to {to}")]
    InvalidTransition {
        from: ConversionState,
        to: ConversionState,
    },
}

/// Lifecycle of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    state: ConversionState,
}

impl Default for Conversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversion {
    pub fn new() -> Self {
        Self {
            state: ConversionState::Pending,
        }
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn begin(&mut self) -> Result<(), ConversionError> {
        self.transition(ConversionState::Pending, ConversionState::InProgress)
    }

    /// Finish with the outcome `doc` shows: any error envelope means
    /// `CompletedWithErrors`.
    pub fn finish(&mut self, doc: &Document) -> Result<ConversionState, ConversionError> {
        let to = if doc.error_count() == 0 {
            ConversionState::Completed
        } else {
            ConversionState::CompletedWithErrors
        };
        self.transition(ConversionState::InProgress, to)?;
        Ok(to)
    }

    fn transition(
        &mut self,
        expected: ConversionState,
        to: ConversionState,
    ) -> Result<(), ConversionError> {
        if self.state != expected {
            return Err(ConversionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_round_trips_unchanged_documents() {
        let src = b"== A ==\nText with [[Link|label]] and {{T}}.\n\n* x\n* y\n";
        let engine = WikitextEngine;
        let doc = engine.markup_to_document(src, "wikitext", &TransformOptions::default());
        assert_eq!(engine.document_to_markup(&doc, Some(src)), src.to_vec());
    }

    #[test]
    fn transclusion_pass_is_optional() {
        let engine = WikitextEngine;
        let options = TransformOptions {
            mark_transclusions: false,
        };
        let doc = engine.markup_to_document(b"{{T}}", "wikitext", &options);
        assert_eq!(doc.error_count(), 0);
        let doc = engine.markup_to_document(b"{{T}}", "wikitext", &TransformOptions::default());
        assert_eq!(doc.error_count(), 1);
    }

    #[test]
    fn conversion_states() {
        let clean = WikitextEngine.markup_to_document(b"ok", "wikitext", &TransformOptions::default());
        let mut conversion = Conversion::new();
        assert_eq!(conversion.state(), ConversionState::Pending);
        conversion.begin().unwrap();
        assert_eq!(conversion.state(), ConversionState::InProgress);
        assert_eq!(conversion.finish(&clean).unwrap(), ConversionState::Completed);
        assert!(conversion.state().is_finished());

        let broken =
            WikitextEngine.markup_to_document(b"[[a{b]]", "wikitext", &TransformOptions::default());
        let mut conversion = Conversion::new();
        conversion.begin().unwrap();
        assert_eq!(
            conversion.finish(&broken).unwrap(),
            ConversionState::CompletedWithErrors
        );
    }

    #[test]
    fn transitions_are_one_way() {
        let doc = Document::new("wikitext");
        let mut conversion = Conversion::new();
        assert!(conversion.finish(&doc).is_err());
        conversion.begin().unwrap();
        assert_eq!(
            conversion.begin(),
            Err(ConversionError::InvalidTransition {
                from: ConversionState::InProgress,
                to: ConversionState::InProgress,
            })
        );
        conversion.finish(&doc).unwrap();
        assert!(conversion.finish(&doc).is_err());
    }
}
