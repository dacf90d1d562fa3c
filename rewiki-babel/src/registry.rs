//! Format registry for format discovery and selection
//!
//! This module provides a centralized registry for all available formats.
//! Formats can be registered and retrieved by name.

use crate::error::FormatError;
use crate::format::Format;
use crate::ir::Document;
use std::collections::HashMap;

/// Registry of document formats
///
/// Provides a centralized registry for all available formats.
/// Formats can be registered and retrieved by name.
///
/// # Examples
///
/// ```ignore
/// let mut registry = FormatRegistry::new();
/// registry.register(MyFormat);
///
/// let format = registry.get("my-format")?;
/// let doc = format.parse("source text")?;
/// ```
pub struct FormatRegistry {
    formats: HashMap<String, Box<dyn Format>>,
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        FormatRegistry {
            formats: HashMap::new(),
        }
    }

    /// Register a format
    ///
    /// If a format with the same name already exists, it will be replaced.
    pub fn register<F: Format + 'static>(&mut self, format: F) {
        self.formats
            .insert(format.name().to_string(), Box::new(format));
    }

    /// Get a format by name
    pub fn get(&self, name: &str) -> Result<&dyn Format, FormatError> {
        self.formats
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| FormatError::FormatNotFound(name.to_string()))
    }

    /// Check if a format exists
    pub fn has(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// List all available format names (sorted)
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<_> = self.formats.keys().cloned().collect();
        names.sort();
        names
    }

    /// Detect format from filename based on file extension
    ///
    /// Returns the format name if a matching extension is found, or None otherwise.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let registry = FormatRegistry::default();
    /// assert_eq!(registry.detect_format_from_filename("Main_Page.wiki"), Some("wikitext".to_string()));
    /// assert_eq!(registry.detect_format_from_filename("bundle.json"), Some("pagebundle".to_string()));
    /// assert_eq!(registry.detect_format_from_filename("doc.unknown"), None);
    /// ```
    pub fn detect_format_from_filename(&self, filename: &str) -> Option<String> {
        // Extract extension from filename
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?;

        // Search for a format that supports this extension
        for format in self.formats.values() {
            if format.file_extensions().contains(&extension) {
                return Some(format.name().to_string());
            }
        }

        None
    }

    /// Parse source text using the specified format
    pub fn parse(&self, source: &str, format: &str) -> Result<Document, FormatError> {
        let fmt = self.get(format)?;
        if !fmt.supports_parsing() {
            return Err(FormatError::NotSupported(format!(
                "Format '{format}' does not support parsing"
            )));
        }
        fmt.parse(source)
    }

    /// Serialize a document using the specified format
    pub fn serialize(&self, doc: &Document, format: &str) -> Result<String, FormatError> {
        self.serialize_with_options(doc, format, &HashMap::new())
    }

    /// Serialize a document using the specified format and options
    pub fn serialize_with_options(
        &self,
        doc: &Document,
        format: &str,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        let fmt = self.get(format)?;
        if !fmt.supports_serialization() {
            return Err(FormatError::NotSupported(format!(
                "Format '{format}' does not support serialization"
            )));
        }
        fmt.serialize_with_options(doc, options)
    }

    /// Create a registry with the built-in formats
    ///
    /// Pass a configured [`crate::formats::HtmlOptions`] through
    /// [`FormatRegistry::with_html_options`] instead when the HTML output
    /// should not use the defaults.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(crate::formats::wikitext::WikitextFormat);
        registry.register(crate::formats::html::HtmlFormat::default());
        registry.register(crate::formats::pagebundle::PageBundleFormat::default());

        registry
    }
}

impl FormatRegistry {
    /// Built-in formats with the HTML-based ones using `options`.
    pub fn with_html_options(options: crate::formats::HtmlOptions) -> Self {
        let mut registry = Self::with_defaults();
        registry.register(crate::formats::html::HtmlFormat::new(options.clone()));
        registry.register(crate::formats::pagebundle::PageBundleFormat::new(options));
        registry
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::ir::NodeKind;

    // Test format
    struct TestFormat;
    impl Format for TestFormat {
        fn name(&self) -> &str {
            "test"
        }
        fn description(&self) -> &str {
            "Test format"
        }
        fn supports_parsing(&self) -> bool {
            true
        }
        fn supports_serialization(&self) -> bool {
            true
        }
        fn parse(&self, source: &str) -> Result<Document, FormatError> {
            let mut doc = Document::new("wikitext");
            doc.append_child(doc.root(), NodeKind::Text(source.to_string()))
                .map_err(|e| FormatError::ParseError(e.to_string()))?;
            Ok(doc)
        }
        fn serialize(&self, _doc: &Document) -> Result<String, FormatError> {
            Ok("test output".to_string())
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.formats.len(), 0);
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormat);

        assert!(registry.has("test"));
        assert!(!registry.has("nonexistent"));
        assert_eq!(registry.list_formats(), vec!["test"]);
        assert_eq!(registry.get("test").unwrap().name(), "test");
    }

    #[test]
    fn test_registry_parse() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormat);

        let doc = registry.parse("input", "test").unwrap();
        assert_eq!(doc.text_content(doc.root()), "input");
    }

    #[test]
    fn test_registry_parse_not_found() {
        let registry = FormatRegistry::new();

        match registry.parse("input", "nonexistent").unwrap_err() {
            FormatError::FormatNotFound(name) => assert_eq!(name, "nonexistent"),
            other => panic!("Expected FormatNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_serialize() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormat);

        let doc = Document::new("wikitext");
        assert_eq!(registry.serialize(&doc, "test").unwrap(), "test output");
        assert!(matches!(
            registry.serialize(&doc, "nonexistent"),
            Err(FormatError::FormatNotFound(_))
        ));
    }

    #[test]
    fn test_registry_serialize_with_options_default_behavior() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormat);

        let doc = Document::new("wikitext");
        let mut options = HashMap::new();
        options.insert("unused".to_string(), "true".to_string());

        let result = registry.serialize_with_options(&doc, "test", &options);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = FormatRegistry::default();
        assert_eq!(
            registry.list_formats(),
            vec!["html", "pagebundle", "wikitext"]
        );
    }

    #[test]
    fn test_registry_replace_format() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormat);
        registry.register(TestFormat); // Replace

        assert_eq!(registry.list_formats().len(), 1);
    }

    #[test]
    fn test_detect_format_from_filename() {
        let registry = FormatRegistry::with_defaults();

        assert_eq!(
            registry.detect_format_from_filename("Main_Page.wiki"),
            Some("wikitext".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("/path/to/page.wikitext"),
            Some("wikitext".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("page.html"),
            Some("html".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("page.htm"),
            Some("html".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("bundle.json"),
            Some("pagebundle".to_string())
        );

        assert_eq!(registry.detect_format_from_filename("doc.unknown"), None);
        assert_eq!(registry.detect_format_from_filename("doc"), None);
    }

    #[test]
    fn test_html_options_reach_both_html_formats() {
        let options = crate::formats::HtmlOptions::default().with_version("2.6.0");
        let registry = FormatRegistry::with_html_options(options);
        let doc = registry.parse("a", "wikitext").unwrap();
        let html = registry.serialize(&doc, "html").unwrap();
        let bundle = registry.serialize(&doc, "pagebundle").unwrap();
        assert!(html.contains(r#"content="2.6.0""#));
        assert!(bundle.contains(r#""version": "2.6.0""#));
    }
}
