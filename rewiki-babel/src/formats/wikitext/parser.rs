//! Wikitext parsing (markup → Document)
//!
//! Line-based block pass followed by an inline scanner per block. Every
//! element records its source range so the serializer can hand back the
//! original bytes for anything left untouched.

use super::{is_text_model, messages, WIKITEXT_MODEL};
use crate::annotations::{DomSourceRange, ErrorEnvelope, Namespace};
use crate::codec::CodecValue;
use crate::ir::{Document, NodeId, NodeKind, TreeError};
use crate::title::PageTitle;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;

const NOWIKI_OPEN: &str = "<nowiki>";
const NOWIKI_CLOSE: &str = "</nowiki>";

/// Content bytes decoded for parsing.
///
/// Each invalid UTF-8 sequence reads as one U+FFFD. The replacements are
/// remembered, so any text range maps back to the exact bytes it came from.
#[derive(Debug, Clone)]
pub struct SourceText<'a> {
    bytes: &'a [u8],
    text: Cow<'a, str>,
    replacements: Vec<Replacement>,
}

/// One U+FFFD standing in for `len` invalid bytes.
#[derive(Debug, Clone, Copy)]
struct Replacement {
    text_start: usize,
    len: usize,
}

const REPLACEMENT_LEN: usize = char::REPLACEMENT_CHARACTER.len_utf8();

impl<'a> SourceText<'a> {
    pub fn decode(bytes: &'a [u8]) -> Self {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return SourceText {
                bytes,
                text: Cow::Borrowed(text),
                replacements: Vec::new(),
            };
        }
        let mut text = String::with_capacity(bytes.len() + REPLACEMENT_LEN);
        let mut replacements = Vec::new();
        let mut rest = bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    // `valid_up_to` marks a char boundary
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    let len = error.error_len().unwrap_or(after.len());
                    replacements.push(Replacement {
                        text_start: text.len(),
                        len,
                    });
                    text.push(char::REPLACEMENT_CHARACTER);
                    rest = &after[len..];
                }
            }
        }
        SourceText {
            bytes,
            text: Cow::Owned(text),
            replacements,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether any bytes had to be replaced.
    pub fn is_lossy(&self) -> bool {
        !self.replacements.is_empty()
    }

    /// The original bytes behind a range of the decoded text.
    ///
    /// `None` when the range is out of bounds or not on char boundaries.
    pub fn original_bytes(&self, range: Range<usize>) -> Option<&'a [u8]> {
        self.text.get(range.clone())?;
        self.bytes
            .get(self.byte_offset(range.start)..self.byte_offset(range.end))
    }

    fn byte_offset(&self, text_offset: usize) -> usize {
        let shrink: usize = self
            .replacements
            .iter()
            .take_while(|r| r.text_start < text_offset)
            .map(|r| REPLACEMENT_LEN - r.len)
            .sum();
        text_offset - shrink
    }
}

/// Parse page content of the given content model.
///
/// Never fails: problems are recorded as error envelopes on the node they
/// concern.
pub fn parse_wikitext(content: &[u8], content_model: &str) -> Document {
    let source = SourceText::decode(content);
    let text = source.as_str();
    let mut doc = Document::new(content_model);
    doc.set_dsr(NodeId::ROOT, DomSourceRange::plain(0, text.len()));
    if source.is_lossy() {
        doc.push_error(
            NodeId::ROOT,
            ErrorEnvelope::builtin(messages::INVALID_UTF8)
                .with_message("Content is not valid UTF-8; invalid bytes are shown as U+FFFD"),
        );
    }

    let built = if content_model == WIKITEXT_MODEL {
        Parser::new(text, &mut doc).blocks()
    } else {
        let built = verbatim(text, &mut doc);
        if !is_text_model(content_model) {
            doc.push_error(
                NodeId::ROOT,
                ErrorEnvelope::builtin(messages::UNSUPPORTED_CONTENT_MODEL)
                    .with_message("Unsupported content model: $1")
                    .with_param(content_model),
            );
        }
        built
    };
    if let Err(error) = built {
        tracing::warn!(%error, "document tree left incomplete");
    }

    tracing::debug!(
        model = content_model,
        nodes = doc.len(),
        errors = doc.error_count(),
        "parsed wikitext"
    );
    doc
}

/// Record that no template could be expanded.
///
/// Runs as its own pass over the finished tree.
pub fn mark_unexpanded_transclusions(doc: &mut Document) {
    let pending: Vec<(NodeId, PageTitle)> = doc
        .descendants(NodeId::ROOT)
        .filter_map(|id| match doc.kind(id) {
            Some(NodeKind::Transclusion { target }) => Some((id, target.clone())),
            _ => None,
        })
        .collect();
    for (id, target) in pending {
        doc.push_error(
            id,
            ErrorEnvelope::builtin(messages::TEMPLATE_EXPANSION_UNAVAILABLE)
                .with_message("Template $1 could not be expanded")
                .with_param(target),
        );
    }
}

fn verbatim(text: &str, doc: &mut Document) -> Result<(), TreeError> {
    if text.is_empty() {
        return Ok(());
    }
    let pre = doc.append_child(NodeId::ROOT, NodeKind::Preformatted)?;
    doc.set_dsr(pre, DomSourceRange::plain(0, text.len()));
    doc.append_child(pre, NodeKind::Text(text.to_string()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    end: usize,
}

impl Line {
    fn text<'s>(&self, src: &'s str) -> &'s str {
        &src[self.start..self.end]
    }
}

fn split_lines(src: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (index, byte) in src.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(Line { start, end: index });
            start = index + 1;
        }
    }
    if start < src.len() {
        lines.push(Line {
            start,
            end: src.len(),
        });
    }
    lines
}

fn is_rule(line: &str) -> bool {
    line.len() >= 4 && line.bytes().all(|b| b == b'-')
}

fn list_marker(line: &str) -> Option<bool> {
    match line.as_bytes().first() {
        Some(b'*') => Some(false),
        Some(b'#') => Some(true),
        _ => None,
    }
}

/// Level and markup widths of a heading line.
#[derive(Debug, PartialEq)]
struct HeadingShape {
    level: u8,
    open: usize,
    close: usize,
}

fn heading_shape(line: &str) -> Option<HeadingShape> {
    let trimmed = line.trim_end();
    if !trimmed.starts_with('=') || !trimmed.ends_with('=') {
        return None;
    }
    let len = trimmed.len();
    let lead = trimmed.bytes().take_while(|b| *b == b'=').count();
    let trail = trimmed.bytes().rev().take_while(|b| *b == b'=').count();
    let level = if lead == len {
        if len < 3 {
            return None;
        }
        ((len - 1) / 2).min(6)
    } else {
        lead.min(trail).min(6)
    };

    let inner = &trimmed[level..len - level];
    let content = inner.trim();
    let (open, close) = if content.is_empty() {
        (level + inner.len(), line.len() - level - inner.len())
    } else {
        let leading = inner.len() - inner.trim_start().len();
        let trailing = inner.len() - inner.trim_end().len();
        (level + leading, line.len() - len + level + trailing)
    };
    Some(HeadingShape {
        level: level as u8,
        open,
        close,
    })
}

fn is_paragraph_line(line: &str) -> bool {
    !line.trim().is_empty()
        && !is_rule(line)
        && heading_shape(line).is_none()
        && list_marker(line).is_none()
}

enum Inline {
    Nowiki { close: usize },
    Link { close: usize },
    Template { close: usize },
    Quote { close: usize, width: usize },
}

struct Parser<'s, 'd> {
    src: &'s str,
    doc: &'d mut Document,
}

impl<'s, 'd> Parser<'s, 'd> {
    fn new(src: &'s str, doc: &'d mut Document) -> Self {
        Self { src, doc }
    }

    fn blocks(&mut self) -> Result<(), TreeError> {
        let src = self.src;
        let lines = split_lines(src);

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let current = line.text(src);
            if current.trim().is_empty() {
                i += 1;
            } else if is_rule(current) {
                let rule = self.doc.append_child(NodeId::ROOT, NodeKind::HorizontalRule)?;
                self.doc
                    .set_dsr(rule, DomSourceRange::plain(line.start, line.end));
                i += 1;
            } else if let Some(shape) = heading_shape(current) {
                self.heading(line, shape)?;
                i += 1;
            } else if let Some(ordered) = list_marker(current) {
                let count = lines[i..]
                    .iter()
                    .take_while(|l| list_marker(l.text(src)) == Some(ordered))
                    .count();
                self.list(&lines[i..i + count], ordered)?;
                i += count;
            } else {
                let count = lines[i..]
                    .iter()
                    .take_while(|l| is_paragraph_line(l.text(src)))
                    .count();
                let group = &lines[i..i + count];
                let start = group[0].start;
                let end = group[count - 1].end;
                let para = self.doc.append_child(NodeId::ROOT, NodeKind::Paragraph)?;
                self.doc.set_dsr(para, DomSourceRange::plain(start, end));
                self.inline(para, start, end)?;
                i += count;
            }
        }
        Ok(())
    }

    fn heading(&mut self, line: Line, shape: HeadingShape) -> Result<(), TreeError> {
        let id = self.doc.append_child(
            NodeId::ROOT,
            NodeKind::Heading { level: shape.level },
        )?;
        let dsr = DomSourceRange::new(line.start, line.end, shape.open, shape.close);
        self.doc.set_dsr(id, dsr);
        let inner = dsr.inner();
        self.inline(id, inner.start, inner.end)
    }

    fn list(&mut self, lines: &[Line], ordered: bool) -> Result<(), TreeError> {
        let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
            return Ok(());
        };
        let list = self
            .doc
            .append_child(NodeId::ROOT, NodeKind::List { ordered })?;
        self.doc
            .set_dsr(list, DomSourceRange::plain(first.start, last.end));
        for line in lines {
            let body = &self.src[line.start + 1..line.end];
            let padding = body.len() - body.trim_start_matches([' ', '\t']).len();
            let item = self.doc.append_child(list, NodeKind::ListItem)?;
            let dsr = DomSourceRange::new(line.start, line.end, 1 + padding, 0);
            self.doc.set_dsr(item, dsr);
            let inner = dsr.inner();
            self.inline(item, inner.start, inner.end)?;
        }
        Ok(())
    }

    fn inline(&mut self, parent: NodeId, start: usize, end: usize) -> Result<(), TreeError> {
        let src = self.src;
        let mut text_start = start;
        let mut pos = start;
        while pos < end {
            let rest = &src[pos..end];
            let element = if rest.starts_with(NOWIKI_OPEN) {
                src[pos + NOWIKI_OPEN.len()..end]
                    .find(NOWIKI_CLOSE)
                    .map(|i| Inline::Nowiki {
                        close: pos + NOWIKI_OPEN.len() + i,
                    })
            } else if rest.starts_with("[[") {
                self.find_on_line(pos + 2, end, "]]")
                    .map(|close| Inline::Link { close })
            } else if rest.starts_with("{{") {
                self.find_on_line(pos + 2, end, "}}")
                    .map(|close| Inline::Template { close })
            } else if rest.starts_with("'''") {
                self.find_quote_close(pos + 3, end, 3)
                    .map(|close| Inline::Quote { close, width: 3 })
            } else if rest.starts_with("''") {
                self.find_quote_close(pos + 2, end, 2)
                    .map(|close| Inline::Quote { close, width: 2 })
            } else {
                None
            };

            match element {
                Some(element) => {
                    self.text(parent, text_start, pos)?;
                    pos = match element {
                        Inline::Nowiki { close } => self.nowiki(parent, pos, close)?,
                        Inline::Link { close } => self.link(parent, pos, close)?,
                        Inline::Template { close } => self.template(parent, pos, close)?,
                        Inline::Quote { close, width } => {
                            self.quote(parent, pos, close, width)?
                        }
                    };
                    text_start = pos;
                }
                None => pos += rest.chars().next().map_or(1, char::len_utf8),
            }
        }
        self.text(parent, text_start, end)
    }

    fn text(&mut self, parent: NodeId, start: usize, end: usize) -> Result<(), TreeError> {
        if start < end {
            self.doc
                .append_child(parent, NodeKind::Text(self.src[start..end].to_string()))?;
        }
        Ok(())
    }

    fn line_end(&self, from: usize, limit: usize) -> usize {
        self.src[from..limit]
            .find('\n')
            .map_or(limit, |i| from + i)
    }

    fn find_on_line(&self, from: usize, limit: usize, marker: &str) -> Option<usize> {
        let end = self.line_end(from, limit);
        self.src[from..end].find(marker).map(|i| from + i)
    }

    /// Closing run of quotes for bold (`width` 3) or italic (`width` 2).
    ///
    /// Italic skips over runs of three or more so that bold nested inside
    /// italic does not close it early.
    fn find_quote_close(&self, from: usize, limit: usize, width: usize) -> Option<usize> {
        let end = self.line_end(from, limit);
        let bytes = self.src.as_bytes();
        let mut i = from;
        while i + width <= end {
            if bytes[i] != b'\'' {
                i += 1;
                continue;
            }
            let run = bytes[i..end].iter().take_while(|b| **b == b'\'').count();
            let closes = if width == 3 { run >= 3 } else { run == 2 };
            if closes && i > from {
                return Some(i);
            }
            i += run;
        }
        None
    }

    fn nowiki(&mut self, parent: NodeId, start: usize, close: usize) -> Result<usize, TreeError> {
        let end = close + NOWIKI_CLOSE.len();
        let id = self.doc.append_child(parent, NodeKind::Nowiki)?;
        self.doc.set_dsr(
            id,
            DomSourceRange::new(start, end, NOWIKI_OPEN.len(), NOWIKI_CLOSE.len()),
        );
        self.text(id, start + NOWIKI_OPEN.len(), close)?;
        Ok(end)
    }

    fn quote(
        &mut self,
        parent: NodeId,
        start: usize,
        close: usize,
        width: usize,
    ) -> Result<usize, TreeError> {
        let kind = if width == 3 {
            NodeKind::Bold
        } else {
            NodeKind::Italic
        };
        let end = close + width;
        let id = self.doc.append_child(parent, kind)?;
        self.doc
            .set_dsr(id, DomSourceRange::new(start, end, width, width));
        self.inline(id, start + width, close)?;
        Ok(end)
    }

    fn link(&mut self, parent: NodeId, start: usize, close: usize) -> Result<usize, TreeError> {
        let src = self.src;
        let end = close + 2;
        let inner = &src[start + 2..close];
        let (raw, label_start) = match inner.find('|') {
            Some(pipe) => (&inner[..pipe], Some(start + 2 + pipe + 1)),
            None => (inner, None),
        };

        let target = match PageTitle::new(raw) {
            Ok(target) => target,
            Err(error) => {
                let envelope = ErrorEnvelope::builtin(messages::BAD_TITLE)
                    .with_message("Invalid page title: $1")
                    .with_param(raw)
                    .with_param(error.to_string());
                self.unparsed(parent, start, end, envelope)?;
                return Ok(end);
            }
        };

        let id = self.doc.append_child(
            parent,
            NodeKind::WikiLink {
                target: target.clone(),
            },
        )?;
        let open = label_start.map_or(2, |label| label - start);
        self.doc
            .set_dsr(id, DomSourceRange::new(start, end, open, 2));
        let stx = if label_start.is_some() {
            "piped"
        } else {
            "simple"
        };
        self.doc
            .set_hint(id, Namespace::Parsoid, "stx", CodecValue::from(stx));
        let mut sa = BTreeMap::new();
        sa.insert("href".to_string(), CodecValue::from(raw));
        self.doc
            .set_hint(id, Namespace::Parsoid, "sa", CodecValue::Map(sa));
        self.doc
            .set_hint(id, Namespace::Mw, "target", CodecValue::Title(target));

        match label_start {
            Some(label) => self.inline(id, label, close)?,
            None => self.text(id, start + 2, close)?,
        }
        Ok(end)
    }

    fn template(&mut self, parent: NodeId, start: usize, close: usize) -> Result<usize, TreeError> {
        let src = self.src;
        let end = close + 2;
        let inner = &src[start + 2..close];
        let name = inner.split('|').next().unwrap_or_default().trim();

        let target = if name.is_empty() {
            None
        } else {
            PageTitle::new(&format!("Template:{name}")).ok()
        };
        let Some(target) = target else {
            let envelope = ErrorEnvelope::builtin(messages::BAD_TITLE)
                .with_message("Invalid page title: $1")
                .with_param(name);
            self.unparsed(parent, start, end, envelope)?;
            return Ok(end);
        };

        let id = self.doc.append_child(
            parent,
            NodeKind::Transclusion {
                target: target.clone(),
            },
        )?;
        self.doc.set_dsr(id, DomSourceRange::plain(start, end));
        self.doc.set_hint(
            id,
            Namespace::Parsoid,
            "src",
            CodecValue::from(&src[start..end]),
        );
        self.doc
            .set_hint(id, Namespace::Mw, "template", CodecValue::Title(target));
        Ok(end)
    }

    fn unparsed(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        envelope: ErrorEnvelope,
    ) -> Result<(), TreeError> {
        let src = self.src;
        let id = self.doc.append_child(parent, NodeKind::Unparsed)?;
        self.doc.set_dsr(id, DomSourceRange::plain(start, end));
        self.doc.set_hint(
            id,
            Namespace::Parsoid,
            "src",
            CodecValue::from(&src[start..end]),
        );
        self.text(id, start, end)?;
        self.doc.push_error(id, envelope);
        Ok(())
    }
}
