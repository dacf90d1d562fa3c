//! Document model shared by every format.
//!
//! A [`Document`] is an arena of [`nodes::NodeKind`] values keyed by stable
//! [`NodeId`]s, plus the [`AnnotationStore`](crate::annotations::AnnotationStore)
//! describing them. Wikitext and HTML both parse into it and serialize from it.

pub mod document;
pub mod nodes;

pub use document::{Descendants, Document, ErrorCollector, Node, TreeError};
pub use nodes::{NodeId, NodeKind};
