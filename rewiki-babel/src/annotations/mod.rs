//! Out-of-band annotations
//!
//!     Every node of a converted document can carry a bag of annotations kept
//!     apart from the visible tree. A bag has two namespaces:
//!
//!     - [`Namespace::Parsoid`] (`data-parsoid`): structural round-trip hints
//!       such as source ranges and original link spellings.
//!     - [`Namespace::Mw`] (`data-mw`): semantic metadata such as link and
//!       template targets, plus the node's error envelopes under the
//!       reserved `errors` key.
//!
//!     The store is owned by its document and keyed by [`NodeId`]. The
//!     document drops a node's bag in the same step that removes the node,
//!     so the store never describes nodes the tree no longer has.

pub mod dsr;
pub mod envelope;

pub use dsr::DomSourceRange;
pub use envelope::{EnvelopeError, ErrorEnvelope, Localizer, MessageCatalog};

use crate::codec::{json_kind, Codec, CodecValue, DecodeError, DecodeIssue};
use crate::ir::nodes::NodeId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key reserved in [`Namespace::Mw`] for error envelopes.
pub const ERRORS_KEY: &str = "errors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Parsoid,
    Mw,
}

impl Namespace {
    /// HTML attribute (and page bundle section) holding this namespace.
    pub fn attribute(&self) -> &'static str {
        match self {
            Namespace::Parsoid => "data-parsoid",
            Namespace::Mw => "data-mw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("'{key}' is reserved in {namespace}")]
    ReservedKey {
        namespace: &'static str,
        key: String,
    },
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} is a text node and cannot carry annotations")]
    TextNode(NodeId),
}

/// Annotations of a single node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationBag {
    parsoid: BTreeMap<String, CodecValue>,
    mw: BTreeMap<String, CodecValue>,
    errors: Vec<ErrorEnvelope>,
}

impl AnnotationBag {
    pub fn get(&self, namespace: Namespace, key: &str) -> Option<&CodecValue> {
        self.entries(namespace).get(key)
    }

    pub fn entries(&self, namespace: Namespace) -> &BTreeMap<String, CodecValue> {
        match namespace {
            Namespace::Parsoid => &self.parsoid,
            Namespace::Mw => &self.mw,
        }
    }

    pub fn errors(&self) -> &[ErrorEnvelope] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.parsoid.is_empty() && self.mw.is_empty() && self.errors.is_empty()
    }

    fn entries_mut(&mut self, namespace: Namespace) -> &mut BTreeMap<String, CodecValue> {
        match namespace {
            Namespace::Parsoid => &mut self.parsoid,
            Namespace::Mw => &mut self.mw,
        }
    }

    /// JSON form of one namespace, or `None` when it holds nothing.
    pub fn encode_namespace(&self, namespace: Namespace, codec: &Codec) -> Option<Value> {
        let mut fields: Map<String, Value> = self
            .entries(namespace)
            .iter()
            .map(|(k, v)| (k.clone(), codec.encode_value(v)))
            .collect();
        if namespace == Namespace::Mw && !self.errors.is_empty() {
            let errors = self.errors.iter().map(|e| codec.encode(e)).collect();
            fields.insert(ERRORS_KEY.to_string(), Value::Array(errors));
        }
        (!fields.is_empty()).then_some(Value::Object(fields))
    }

    /// Merge a namespace read back from JSON into this bag.
    ///
    /// Fails only when `tree` is not an object; undecodable entries are
    /// skipped and returned.
    pub fn decode_namespace(
        &mut self,
        namespace: Namespace,
        tree: &Value,
        codec: &Codec,
    ) -> Result<Vec<DecodeIssue>, DecodeError> {
        let fields = tree.as_object().ok_or(DecodeError::UnexpectedShape {
            expected: "object",
            found: json_kind(tree),
        })?;
        let mut issues = Vec::new();
        let mut plain = fields.clone();
        if namespace == Namespace::Mw {
            if let Some(errors) = plain.remove(ERRORS_KEY) {
                match codec.decode_list::<ErrorEnvelope>(&errors) {
                    Ok(decoded) => {
                        self.errors.extend(decoded.value);
                        issues.extend(decoded.issues.into_iter().map(|issue| DecodeIssue {
                            location: format!("{ERRORS_KEY}.{}", issue.location),
                            error: issue.error,
                        }));
                    }
                    Err(error) => issues.push(DecodeIssue {
                        location: ERRORS_KEY.to_string(),
                        error,
                    }),
                }
            }
        }
        let mut nested = Vec::new();
        let decoded = codec.decode_map_with(&plain, |key, item| {
            let decoded = codec.decode_value_reporting(item)?;
            nested.extend(decoded.issues.into_iter().map(|issue| DecodeIssue {
                location: format!("{key}.{}", issue.location),
                error: issue.error,
            }));
            Ok(decoded.value)
        });
        self.entries_mut(namespace).extend(decoded.value);
        issues.extend(decoded.issues);
        issues.extend(nested);
        Ok(issues)
    }
}

/// Document-scoped map from node to annotation bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    bags: BTreeMap<NodeId, AnnotationBag>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `(namespace, key)`, replacing any previous value.
    ///
    /// Returns the replaced value.
    pub fn attach(
        &mut self,
        node: NodeId,
        namespace: Namespace,
        key: impl Into<String>,
        value: CodecValue,
    ) -> Result<Option<CodecValue>, AnnotationError> {
        let key = key.into();
        if namespace == Namespace::Mw && key == ERRORS_KEY {
            return Err(AnnotationError::ReservedKey {
                namespace: namespace.attribute(),
                key,
            });
        }
        Ok(self
            .bags
            .entry(node)
            .or_default()
            .entries_mut(namespace)
            .insert(key, value))
    }

    pub fn get(&self, node: NodeId, namespace: Namespace, key: &str) -> Option<&CodecValue> {
        self.bags.get(&node)?.get(namespace, key)
    }

    /// Append an error to the node's list; earlier errors are kept.
    pub fn record_error(&mut self, node: NodeId, envelope: ErrorEnvelope) {
        self.bags.entry(node).or_default().errors.push(envelope);
    }

    pub fn errors(&self, node: NodeId) -> &[ErrorEnvelope] {
        self.bags.get(&node).map(|bag| bag.errors()).unwrap_or(&[])
    }

    pub fn bag(&self, node: NodeId) -> Option<&AnnotationBag> {
        self.bags.get(&node)
    }

    pub(crate) fn bag_mut(&mut self, node: NodeId) -> &mut AnnotationBag {
        self.bags.entry(node).or_default()
    }

    pub fn drop_node(&mut self, node: NodeId) -> Option<AnnotationBag> {
        self.bags.remove(&node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.bags.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(n: u32) -> NodeId {
        NodeId::new(n)
    }

    #[test]
    fn last_write_wins() {
        let mut store = AnnotationStore::new();
        store
            .attach(node(1), Namespace::Parsoid, "stx", "simple".into())
            .unwrap();
        let previous = store
            .attach(node(1), Namespace::Parsoid, "stx", "piped".into())
            .unwrap();
        assert_eq!(previous, Some("simple".into()));
        assert_eq!(
            store.get(node(1), Namespace::Parsoid, "stx"),
            Some(&"piped".into())
        );
    }

    #[test]
    fn namespaces_are_separate() {
        let mut store = AnnotationStore::new();
        store
            .attach(node(1), Namespace::Parsoid, "k", CodecValue::Int(1))
            .unwrap();
        assert_eq!(store.get(node(1), Namespace::Mw, "k"), None);
    }

    #[test]
    fn errors_key_is_reserved() {
        let mut store = AnnotationStore::new();
        let err = store
            .attach(node(1), Namespace::Mw, ERRORS_KEY, CodecValue::Null)
            .unwrap_err();
        assert!(matches!(err, AnnotationError::ReservedKey { .. }));
        assert!(store
            .attach(node(1), Namespace::Parsoid, ERRORS_KEY, CodecValue::Null)
            .is_ok());
    }

    #[test]
    fn recorded_errors_accumulate() {
        let mut store = AnnotationStore::new();
        store.record_error(node(2), ErrorEnvelope::new("first").unwrap());
        store.record_error(node(2), ErrorEnvelope::new("second").unwrap());
        let keys: Vec<_> = store.errors(node(2)).iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec!["first", "second"]);
        assert!(store.errors(node(3)).is_empty());
    }

    #[test]
    fn dropping_a_node_takes_its_whole_bag() {
        let mut store = AnnotationStore::new();
        store.record_error(node(1), ErrorEnvelope::new("a").unwrap());
        store.record_error(node(2), ErrorEnvelope::new("b").unwrap());
        store
            .attach(node(2), Namespace::Parsoid, "dsr", CodecValue::Int(1))
            .unwrap();
        let dropped = store.drop_node(node(2)).unwrap();
        assert_eq!(dropped.errors().len(), 1);
        assert!(store.errors(node(2)).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mw_namespace_encodes_errors_unhinted() {
        let codec = Codec::new();
        let mut store = AnnotationStore::new();
        store
            .attach(node(1), Namespace::Mw, "target", CodecValue::Int(3))
            .unwrap();
        store.record_error(node(1), ErrorEnvelope::new("bad-title").unwrap());

        let tree = store
            .bag(node(1))
            .unwrap()
            .encode_namespace(Namespace::Mw, &codec)
            .unwrap();
        assert_eq!(tree, json!({"target": 3, "errors": [{"key": "bad-title"}]}));
        assert_eq!(
            store
                .bag(node(1))
                .unwrap()
                .encode_namespace(Namespace::Parsoid, &codec),
            None
        );
    }

    #[test]
    fn decoding_a_namespace_reports_bad_entries() {
        let codec = Codec::new();
        let mut bag = AnnotationBag::default();
        let tree = json!({
            "ok": [1, 2],
            "bad": {"_type_": "widget"},
            "errors": [{"key": "x"}, {"message": "no key"}]
        });
        let issues = bag.decode_namespace(Namespace::Mw, &tree, &codec).unwrap();

        let locations: Vec<_> = issues.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(locations, vec!["errors.1", "bad"]);
        assert_eq!(bag.errors().len(), 1);
        assert!(bag.get(Namespace::Mw, "ok").is_some());
        assert!(bag.get(Namespace::Mw, "errors").is_none());
    }

    #[test]
    fn nested_bad_elements_are_reported_per_entry() {
        let codec = Codec::new();
        let mut bag = AnnotationBag::default();
        let tree = json!({"parts": ["a", {"_type_": "widget"}, "b"]});
        let issues = bag.decode_namespace(Namespace::Parsoid, &tree, &codec).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, "parts.1");
        assert_eq!(
            bag.get(Namespace::Parsoid, "parts"),
            Some(&CodecValue::List(vec![CodecValue::from("a"), CodecValue::from("b")]))
        );
    }
}
