//! Wikitext serialization (Document → markup)
//!
//! Without an original the whole tree is written out fresh. With one, the
//! original is re-parsed (ids are deterministic, so they line up with the
//! ids the edited document carried through HTML) and every node whose
//! subtree is unchanged is copied byte for byte from the original source.
//! Only edited nodes are regenerated; gaps between two untouched, still
//! adjacent siblings are copied as well, so an edit stays local.
//!
//! Text is compared the way an HTML parser reads it back: CR and CRLF count
//! as LF and NUL characters are ignored. Copied spans are the original bytes,
//! invalid UTF-8 included.

use super::parser::{parse_wikitext, SourceText};
use super::WIKITEXT_MODEL;
use crate::annotations::Namespace;
use crate::codec::CodecValue;
use crate::ir::{Document, NodeId, NodeKind};
use crate::title::PageTitle;
use std::borrow::Cow;
use std::ops::Range;

/// Serialize `doc`, reusing `original` wherever the tree is unchanged.
pub fn serialize_wikitext(doc: &Document, original: Option<&[u8]>) -> Vec<u8> {
    if doc.content_model() != WIKITEXT_MODEL {
        return doc.text_content(NodeId::ROOT).into_bytes();
    }

    let parsed = original.map(|bytes| {
        let orig = parse_wikitext(bytes, doc.content_model());
        (SourceText::decode(bytes), orig)
    });

    let serializer = Serializer {
        doc,
        original: parsed.as_ref().map(|(src, orig)| Original { src, doc: orig }),
    };
    let mut out = Vec::new();
    serializer.node(NodeId::ROOT, &mut out);
    tracing::debug!(
        bytes = out.len(),
        selective = serializer.original.is_some(),
        "serialized wikitext"
    );
    out
}

#[derive(Clone, Copy)]
struct Original<'a> {
    src: &'a SourceText<'a>,
    doc: &'a Document,
}

impl<'a> Original<'a> {
    fn slice(&self, range: Range<usize>) -> Option<&'a [u8]> {
        self.src.original_bytes(range)
    }
}

struct Serializer<'a> {
    doc: &'a Document,
    original: Option<Original<'a>>,
}

impl<'a> Serializer<'a> {
    /// Original source of `id` when its subtree did not change.
    fn reusable(&self, id: NodeId) -> Option<&'a [u8]> {
        let orig = self.original?;
        if !same_content(self.doc, id, orig.doc, id) {
            return None;
        }
        orig.slice(orig.doc.dsr(id)?.outer())
    }

    /// Original opening and closing markup of a node whose kind is unchanged.
    fn original_markup(&self, id: NodeId) -> Option<(&'a [u8], &'a [u8])> {
        let orig = self.original?;
        if orig.doc.kind(id) != self.doc.kind(id) {
            return None;
        }
        if matches!(self.doc.kind(id), Some(NodeKind::ListItem)) {
            let parent_kind = |d: &Document| d.parent(id).and_then(|p| d.kind(p).cloned());
            if parent_kind(orig.doc) != parent_kind(self.doc) {
                return None;
            }
        }
        let dsr = orig.doc.dsr(id)?;
        Some((orig.slice(dsr.open())?, orig.slice(dsr.close())?))
    }

    fn node(&self, id: NodeId, out: &mut Vec<u8>) {
        if let Some(src) = self.reusable(id) {
            out.extend_from_slice(src);
            return;
        }
        let Some(kind) = self.doc.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Root => self.blocks(id, out),
            NodeKind::Paragraph => self.inline_children(id, out),
            NodeKind::Heading { level } => {
                let eq = "=".repeat(usize::from(*level));
                self.wrapped(id, &format!("{eq} "), &format!(" {eq}"), out);
            }
            NodeKind::List { .. } => self.blocks(id, out),
            NodeKind::ListItem => {
                let ordered = self
                    .doc
                    .parent(id)
                    .and_then(|p| self.doc.kind(p))
                    .is_some_and(|k| matches!(k, NodeKind::List { ordered: true }));
                let bullet = if ordered { "# " } else { "* " };
                self.wrapped(id, bullet, "", out);
            }
            NodeKind::HorizontalRule => out.extend_from_slice(b"----"),
            NodeKind::Preformatted | NodeKind::Unparsed => {
                out.extend_from_slice(self.doc.text_content(id).as_bytes())
            }
            NodeKind::Text(text) => out.extend_from_slice(text.as_bytes()),
            NodeKind::Bold => self.wrapped(id, "'''", "'''", out),
            NodeKind::Italic => self.wrapped(id, "''", "''", out),
            NodeKind::WikiLink { target } => self.link(id, target, out),
            NodeKind::Transclusion { target } => self.transclusion(id, target, out),
            NodeKind::Nowiki => {
                out.extend_from_slice(b"<nowiki>");
                out.extend_from_slice(self.doc.text_content(id).as_bytes());
                out.extend_from_slice(b"</nowiki>");
            }
        }
    }

    fn wrapped(&self, id: NodeId, open: &str, close: &str, out: &mut Vec<u8>) {
        let (open, close) = self
            .original_markup(id)
            .unwrap_or((open.as_bytes(), close.as_bytes()));
        out.extend_from_slice(open);
        self.inline_children(id, out);
        out.extend_from_slice(close);
    }

    fn blocks(&self, parent: NodeId, out: &mut Vec<u8>) {
        let children = self.doc.children(parent);
        let is_root = parent == NodeId::ROOT;
        if is_root {
            out.extend_from_slice(self.root_leading_gap());
        }
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                out.extend_from_slice(self.separator(parent, children[index - 1], *child));
            }
            self.node(*child, out);
        }
        if is_root {
            out.extend_from_slice(self.root_trailing_gap());
        }
    }

    fn root_leading_gap(&self) -> &'a [u8] {
        let Some(orig) = self.original else {
            return b"";
        };
        let first = self.doc.children(NodeId::ROOT).first();
        match (first, orig.doc.children(NodeId::ROOT).first()) {
            (Some(a), Some(b)) if a == b => orig
                .doc
                .dsr(*a)
                .and_then(|dsr| orig.slice(0..dsr.start))
                .unwrap_or(b""),
            _ => b"",
        }
    }

    fn root_trailing_gap(&self) -> &'a [u8] {
        let Some(orig) = self.original else {
            return b"";
        };
        let text = orig.src.as_str();
        let last = self.doc.children(NodeId::ROOT).last();
        match (last, orig.doc.children(NodeId::ROOT).last()) {
            (Some(a), Some(b)) if a == b => orig
                .doc
                .dsr(*a)
                .and_then(|dsr| orig.slice(dsr.end..text.len()))
                .unwrap_or(b""),
            _ if text.ends_with('\n') => b"\n",
            _ => b"",
        }
    }

    fn separator(&self, parent: NodeId, a: NodeId, b: NodeId) -> &'a [u8] {
        if let Some(orig) = self.original {
            let siblings = orig.doc.children(parent);
            let adjacent = siblings
                .iter()
                .position(|n| *n == a)
                .is_some_and(|i| siblings.get(i + 1) == Some(&b));
            if adjacent {
                if let (Some(x), Some(y)) = (orig.doc.dsr(a), orig.doc.dsr(b)) {
                    if let Some(gap) = orig.slice(x.end..y.start) {
                        return gap;
                    }
                }
            }
        }
        default_separator(self.doc.kind(parent), self.doc.kind(a), self.doc.kind(b)).as_bytes()
    }

    fn inline_children(&self, parent: NodeId, out: &mut Vec<u8>) {
        let orig_children = self.original.and_then(|orig| {
            (orig.doc.kind(parent) == self.doc.kind(parent))
                .then(|| (orig.doc, orig.doc.children(parent)))
        });
        let line_start = matches!(self.doc.kind(parent), Some(NodeKind::Paragraph));

        for (index, child) in self.doc.children(parent).iter().enumerate() {
            let Some(NodeKind::Text(text)) = self.doc.kind(*child) else {
                self.node(*child, out);
                continue;
            };
            let unchanged = orig_children.and_then(|(orig, siblings)| {
                siblings
                    .get(index)
                    .and_then(|sibling| orig.kind(*sibling))
                    .and_then(NodeKind::text)
                    .filter(|before| same_text(before, text))
            });
            if let Some(before) = unchanged {
                out.extend_from_slice(before.as_bytes());
            } else if needs_nowiki(text, line_start && index == 0) {
                out.extend_from_slice(b"<nowiki>");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"</nowiki>");
            } else {
                out.extend_from_slice(text.as_bytes());
            }
        }
    }

    fn link(&self, id: NodeId, target: &PageTitle, out: &mut Vec<u8>) {
        let raw = self
            .doc
            .annotation(id, Namespace::Parsoid, "sa")
            .and_then(CodecValue::as_map)
            .and_then(|sa| sa.get("href"))
            .and_then(CodecValue::as_str)
            .filter(|raw| PageTitle::new(raw).ok().as_ref() == Some(target))
            .unwrap_or(target.text());

        let mut label = Vec::new();
        self.inline_children(id, &mut label);

        out.extend_from_slice(b"[[");
        out.extend_from_slice(raw.as_bytes());
        if label != raw.as_bytes() {
            out.push(b'|');
            out.extend_from_slice(&label);
        }
        out.extend_from_slice(b"]]");
    }

    fn transclusion(&self, id: NodeId, target: &PageTitle, out: &mut Vec<u8>) {
        let src = self
            .doc
            .annotation(id, Namespace::Parsoid, "src")
            .and_then(CodecValue::as_str);
        match src {
            Some(src) => out.extend_from_slice(src.as_bytes()),
            None => {
                let name = target
                    .text()
                    .strip_prefix("Template:")
                    .unwrap_or(target.text());
                out.extend_from_slice(b"{{");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b"}}");
            }
        }
    }
}

/// Whether two subtrees would read back from HTML as the same tree.
///
/// Like [`Document::subtree_equal`], except that text is compared through
/// [`html_text`] and text children that read back empty are skipped.
fn same_content(doc: &Document, id: NodeId, other: &Document, other_id: NodeId) -> bool {
    match (doc.kind(id), other.kind(other_id)) {
        (Some(NodeKind::Text(a)), Some(NodeKind::Text(b))) => same_text(a, b),
        (Some(a), Some(b)) if a == b => {
            let mut ours = significant_children(doc, id);
            let mut theirs = significant_children(other, other_id);
            loop {
                match (ours.next(), theirs.next()) {
                    (None, None) => return true,
                    (Some(x), Some(y)) if same_content(doc, x, other, y) => {}
                    _ => return false,
                }
            }
        }
        _ => false,
    }
}

fn significant_children(doc: &Document, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    doc.children(id).iter().copied().filter(move |child| {
        doc.kind(*child)
            .and_then(NodeKind::text)
            .map_or(true, |text| !html_text(text).is_empty())
    })
}

fn same_text(a: &str, b: &str) -> bool {
    a == b || html_text(a) == html_text(b)
}

/// Text as an HTML parser hands it back: CRLF and CR become LF, NUL is gone.
fn html_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['\r', '\0']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\0', ""),
    )
}

fn default_separator(
    parent: Option<&NodeKind>,
    a: Option<&NodeKind>,
    b: Option<&NodeKind>,
) -> &'static str {
    match (parent, a, b) {
        (Some(NodeKind::Root), Some(NodeKind::Paragraph), Some(NodeKind::Paragraph)) => "\n\n",
        (
            Some(NodeKind::Root),
            Some(NodeKind::List { ordered: x }),
            Some(NodeKind::List { ordered: y }),
        ) if x == y => "\n\n",
        _ => "\n",
    }
}

/// Whether fresh text would be read back as markup.
fn needs_nowiki(text: &str, at_line_start: bool) -> bool {
    const INLINE: [&str; 6] = ["[[", "]]", "{{", "}}", "''", "<nowiki>"];
    if INLINE.iter().any(|marker| text.contains(marker)) {
        return true;
    }
    let starts_block = |line: &str| line.starts_with(['*', '#', '=']) || line.starts_with("----");
    (at_line_start && starts_block(text)) || text.split('\n').skip(1).any(starts_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::wikitext::to_document;

    const PAGE: &str = "Intro with [[Link|label]] and '''bold'''.\n\n== Section ==\n* one\n* two\n\n{{Tpl}} tail\n";

    fn write(doc: &Document, original: Option<&str>) -> String {
        String::from_utf8(serialize_wikitext(doc, original.map(str::as_bytes))).unwrap()
    }

    fn text_node(doc: &Document, needle: &str) -> NodeId {
        doc.descendants(NodeId::ROOT)
            .find(|id| doc.kind(*id).and_then(NodeKind::text) == Some(needle))
            .unwrap()
    }

    #[test]
    fn unmodified_document_is_byte_identical() {
        let doc = to_document(PAGE.as_bytes(), WIKITEXT_MODEL);
        assert_eq!(write(&doc, Some(PAGE)), PAGE);
    }

    #[test]
    fn edit_changes_only_its_span() {
        let mut doc = to_document(PAGE.as_bytes(), WIKITEXT_MODEL);
        let two = text_node(&doc, "two");
        doc.set_text(two, "deux").unwrap();
        assert_eq!(
            write(&doc, Some(PAGE)),
            PAGE.replace("* two", "* deux")
        );
    }

    #[test]
    fn removed_block_keeps_neighbours() {
        let mut doc = to_document(PAGE.as_bytes(), WIKITEXT_MODEL);
        let heading = doc.children(NodeId::ROOT)[1];
        doc.remove(heading).unwrap();
        assert_eq!(
            write(&doc, Some(PAGE)),
            "Intro with [[Link|label]] and '''bold'''.\n* one\n* two\n\n{{Tpl}} tail\n"
        );
    }

    #[test]
    fn relabelled_simple_link_becomes_piped() {
        let src = "See [[Foo]].";
        let mut doc = to_document(src.as_bytes(), WIKITEXT_MODEL);
        let label = text_node(&doc, "Foo");
        doc.set_text(label, "the foo").unwrap();
        assert_eq!(
            write(&doc, Some(src)),
            "See [[Foo|the foo]]."
        );
    }

    #[test]
    fn fresh_text_that_looks_like_markup_is_escaped() {
        let mut doc = Document::new(WIKITEXT_MODEL);
        let para = doc.append_child(NodeId::ROOT, NodeKind::Paragraph).unwrap();
        doc.append_child(para, NodeKind::Text("* not a list [[x]]".into()))
            .unwrap();
        assert_eq!(
            write(&doc, None),
            "<nowiki>* not a list [[x]]</nowiki>"
        );
    }

    #[test]
    fn fresh_blocks_use_default_separators() {
        let mut doc = Document::new(WIKITEXT_MODEL);
        let heading = doc
            .append_child(NodeId::ROOT, NodeKind::Heading { level: 2 })
            .unwrap();
        doc.append_child(heading, NodeKind::Text("H".into())).unwrap();
        for word in ["a", "b"] {
            let para = doc.append_child(NodeId::ROOT, NodeKind::Paragraph).unwrap();
            doc.append_child(para, NodeKind::Text(word.into())).unwrap();
        }
        assert_eq!(write(&doc, None), "== H ==\na\n\nb");
    }

    #[test]
    fn other_models_serialize_their_text() {
        let doc = to_document(b"body { color: red }", "css");
        assert_eq!(write(&doc, None), "body { color: red }");
    }

    #[test]
    fn line_ending_and_nul_differences_keep_the_original() {
        let src = "One\r\ntwo [[Link|l\0x]]\r\n\r\n== H ==\r\n";
        let mut doc = to_document(src.as_bytes(), WIKITEXT_MODEL);
        for id in doc.descendants(NodeId::ROOT).collect::<Vec<_>>() {
            if let Some(text) = doc.kind(id).and_then(NodeKind::text) {
                let read_back = text.replace("\r\n", "\n").replace('\0', "");
                doc.set_text(id, read_back).unwrap();
            }
        }
        assert_eq!(write(&doc, Some(src)), src);
    }

    #[test]
    fn edits_next_to_crlf_text_keep_it() {
        let src = "a ''b''\r\nc";
        let mut doc = to_document(src.as_bytes(), WIKITEXT_MODEL);
        let b = text_node(&doc, "b");
        doc.set_text(b, "B").unwrap();
        let tail = text_node(&doc, "\r\nc");
        doc.set_text(tail, "\nc").unwrap();
        assert_eq!(write(&doc, Some(src)), "a ''B''\r\nc");
    }

    #[test]
    fn invalid_utf8_is_copied_back_verbatim() {
        let src: &[u8] = b"ok \xff here\n\n== H\xfe ==\n";
        let mut doc = to_document(src, WIKITEXT_MODEL);
        assert_eq!(serialize_wikitext(&doc, Some(src)), src);

        let ok = text_node(&doc, "ok \u{FFFD} here");
        doc.set_text(ok, "fine").unwrap();
        assert_eq!(
            serialize_wikitext(&doc, Some(src)),
            b"fine\n\n== H\xfe ==\n"
        );
    }

    #[test]
    fn html_text_normalization() {
        assert_eq!(html_text("a\r\nb\rc\0"), "a\nb\nc");
        assert!(matches!(html_text("plain"), Cow::Borrowed("plain")));
        assert!(same_text("x\r\n", "x\n"));
        assert!(!same_text("x\r\n", "x\n\n"));
    }

    #[test]
    fn needs_nowiki_rules() {
        assert!(needs_nowiki("a ''b", false));
        assert!(needs_nowiki("= x", true));
        assert!(!needs_nowiki("= x", false));
        assert!(needs_nowiki("a\n# b", false));
        assert!(!needs_nowiki("plain text", true));
    }
}
