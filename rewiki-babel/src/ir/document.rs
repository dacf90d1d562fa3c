//! The converted document: a node arena plus its annotation store.

use super::nodes::{NodeId, NodeKind};
use crate::annotations::{
    AnnotationError, AnnotationStore, DomSourceRange, ErrorEnvelope, Namespace,
};
use crate::codec::{Codec, CodecValue, DecodeError, DecodeIssue};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} already exists")]
    DuplicateId(NodeId),
    #[error("the root node cannot be removed")]
    RootRemoval,
    #[error("node {0} cannot have children")]
    NotAContainer(NodeId),
    #[error("node {0} is not a text node")]
    NotText(NodeId),
    #[error("no node ids left to allocate")]
    IdsExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A converted page.
///
/// Nodes live in an arena keyed by [`NodeId`]; the annotation store is owned
/// by the document and every mutation goes through `&mut Document`, so one
/// pass at a time has exclusive access to both.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u32,
    annotations: AnnotationStore,
    content_model: String,
}

impl Document {
    pub fn new(content_model: impl Into<String>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodeId::ROOT,
            Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            annotations: AnnotationStore::new(),
            content_model: content_model.into(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn content_model(&self) -> &str {
        &self.content_model
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The id the next appended node will receive.
    pub fn next_id(&self) -> NodeId {
        NodeId::new(self.next_id)
    }

    /// Make sure freshly appended nodes get ids at or above `next`.
    pub fn reserve_ids(&mut self, next: NodeId) {
        self.next_id = self.next_id.max(next.index());
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&id).map(|node| &node.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id)?.parent
    }

    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, TreeError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, kind)
    }

    /// Insert a new node at `index` among `parent`'s children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        if self.next_id >= NodeId::LIMIT {
            return Err(TreeError::IdsExhausted);
        }
        let id = NodeId::new(self.next_id);
        self.link(parent, Some(index), id, kind)?;
        Ok(id)
    }

    /// Append a node under an id chosen by the caller, e.g. one read from HTML.
    pub fn append_child_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        kind: NodeKind,
    ) -> Result<(), TreeError> {
        if id.index() >= NodeId::LIMIT {
            return Err(TreeError::IdsExhausted);
        }
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }
        self.link(parent, None, id, kind)
    }

    fn link(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        id: NodeId,
        kind: NodeKind,
    ) -> Result<(), TreeError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(TreeError::UnknownNode(parent))?;
        if matches!(parent_node.kind, NodeKind::Text(_) | NodeKind::HorizontalRule) {
            return Err(TreeError::NotAContainer(parent));
        }
        let index = index
            .unwrap_or(parent_node.children.len())
            .min(parent_node.children.len());
        parent_node.children.insert(index, id);
        self.nodes.insert(
            id,
            Node {
                kind,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        self.next_id = self.next_id.max(id.index().saturating_add(1));
        Ok(())
    }

    /// Remove a node with its whole subtree.
    ///
    /// The annotation bags of every removed node go in the same step.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if id == NodeId::ROOT {
            return Err(TreeError::RootRemoval);
        }
        let parent = self.parent(id).ok_or(TreeError::UnknownNode(id))?;
        let removed: Vec<NodeId> = self.descendants(id).collect();
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != id);
        }
        for node in &removed {
            self.nodes.remove(node);
            self.annotations.drop_node(*node);
        }
        tracing::debug!(node = %id, count = removed.len(), "removed subtree");
        Ok(removed)
    }

    /// Replace the text of a text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), TreeError> {
        match self.nodes.get_mut(&id) {
            Some(node) if node.kind.is_text() => {
                node.kind = NodeKind::Text(text.into());
                Ok(())
            }
            Some(_) => Err(TreeError::NotText(id)),
            None => Err(TreeError::UnknownNode(id)),
        }
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if self.contains(id) { vec![id] } else { Vec::new() };
        Descendants { doc: self, stack }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| self.kind(node).and_then(NodeKind::text))
            .collect()
    }

    /// Whether two subtrees have the same kinds and text, ignoring ids.
    pub fn subtree_equal(&self, id: NodeId, other: &Document, other_id: NodeId) -> bool {
        match (self.node(id), other.node(other_id)) {
            (Some(a), Some(b)) => {
                a.kind == b.kind
                    && a.children.len() == b.children.len()
                    && a.children
                        .iter()
                        .zip(&b.children)
                        .all(|(x, y)| self.subtree_equal(*x, other, *y))
            }
            _ => false,
        }
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// Attach an annotation to an existing element node; last write wins.
    ///
    /// Text nodes have no element in HTML to carry a `data-*` attribute or an
    /// id, so they take no annotations.
    pub fn annotate(
        &mut self,
        node: NodeId,
        namespace: Namespace,
        key: impl Into<String>,
        value: CodecValue,
    ) -> Result<Option<CodecValue>, AnnotationError> {
        self.check_annotatable(node)?;
        self.annotations.attach(node, namespace, key, value)
    }

    fn check_annotatable(&self, node: NodeId) -> Result<(), AnnotationError> {
        match self.kind(node) {
            None => Err(AnnotationError::UnknownNode(node)),
            Some(kind) if kind.is_text() => Err(AnnotationError::TextNode(node)),
            Some(_) => Ok(()),
        }
    }

    pub fn annotation(&self, node: NodeId, namespace: Namespace, key: &str) -> Option<&CodecValue> {
        self.annotations.get(node, namespace, key)
    }

    pub fn record_error(
        &mut self,
        node: NodeId,
        envelope: ErrorEnvelope,
    ) -> Result<(), AnnotationError> {
        self.check_annotatable(node)?;
        self.annotations.record_error(node, envelope);
        Ok(())
    }

    pub fn dsr(&self, node: NodeId) -> Option<DomSourceRange> {
        self.annotation(node, Namespace::Parsoid, DomSourceRange::KEY)
            .and_then(DomSourceRange::from_value)
    }

    pub(crate) fn set_dsr(&mut self, node: NodeId, dsr: DomSourceRange) {
        self.set_hint(node, Namespace::Parsoid, DomSourceRange::KEY, dsr.to_value());
    }

    /// Attach a hint from inside a conversion pass, where `node` was just
    /// created and `key` is a fixed non-reserved name.
    pub(crate) fn set_hint(
        &mut self,
        node: NodeId,
        namespace: Namespace,
        key: &'static str,
        value: CodecValue,
    ) {
        if let Err(error) = self.annotate(node, namespace, key, value) {
            tracing::warn!(%node, key, %error, "hint not attached");
        }
    }

    pub(crate) fn push_error(&mut self, node: NodeId, envelope: ErrorEnvelope) {
        if let Err(error) = self.record_error(node, envelope) {
            tracing::warn!(%node, %error, "error envelope not recorded");
        }
    }

    /// Merge a namespace read back from JSON into a node's bag.
    pub fn load_annotations(
        &mut self,
        node: NodeId,
        namespace: Namespace,
        tree: &Value,
        codec: &Codec,
    ) -> Result<Vec<DecodeIssue>, DecodeError> {
        if let Err(error) = self.check_annotatable(node) {
            return Err(DecodeError::InvalidField {
                field: "id",
                reason: error.to_string(),
            });
        }
        self.annotations
            .bag_mut(node)
            .decode_namespace(namespace, tree, codec)
    }

    /// All error envelopes in document order.
    ///
    /// The walk is lazy and borrows the document; call again (or clone the
    /// iterator) to start over.
    pub fn collect_errors(&self) -> ErrorCollector<'_> {
        ErrorCollector {
            doc: self,
            nodes: self.descendants(NodeId::ROOT),
            current: None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.collect_errors().count()
    }
}

/// Pre-order iterator over a subtree.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Iterator returned by [`Document::collect_errors`].
#[derive(Debug, Clone)]
pub struct ErrorCollector<'a> {
    doc: &'a Document,
    nodes: Descendants<'a>,
    current: Option<(NodeId, &'a [ErrorEnvelope])>,
}

impl<'a> Iterator for ErrorCollector<'a> {
    type Item = (NodeId, &'a ErrorEnvelope);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((id, pending)) = &mut self.current {
                let slice: &'a [ErrorEnvelope] = *pending;
                if let Some((first, rest)) = slice.split_first() {
                    *pending = rest;
                    return Some((*id, first));
                }
            }
            let next = self.nodes.next()?;
            self.current = Some((next, self.doc.annotations.errors(next)));
        }
    }
}
