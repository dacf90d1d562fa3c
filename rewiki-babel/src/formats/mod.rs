//! Format implementations
//!
//! This module contains the format implementations that convert between
//! [`crate::ir::Document`] and its textual representations: source markup,
//! annotated HTML and page bundles.

pub mod html;
pub mod pagebundle;
pub mod wikitext;

pub use html::{HtmlFormat, HtmlOptions};
pub use pagebundle::{PageBundle, PageBundleFormat};
pub use wikitext::WikitextFormat;
