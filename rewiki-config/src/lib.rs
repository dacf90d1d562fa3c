//! Shared configuration loader for the rewiki toolchain.
//!
//! `defaults/rewiki.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`RewikiConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use rewiki_babel::handler::HandlerSettings;
use rewiki_babel::negotiate::{ContentVersion, OutputFormat};
use rewiki_babel::MessageCatalog;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TOML: &str = include_str!("../defaults/rewiki.default.toml");

/// File picked up from the working directory when present.
pub const LOCAL_CONFIG_FILE: &str = "rewiki.toml";

/// Top-level configuration consumed by rewiki applications.
#[derive(Debug, Clone, Deserialize)]
pub struct RewikiConfig {
    pub negotiation: NegotiationConfig,
    pub resolver: ResolverConfig,
    pub handler: HandlerConfig,
    pub html: HtmlConfig,
    pub logging: LoggingConfig,
    /// Message key → localized text
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NegotiationConfig {
    #[serde(deserialize_with = "parse_list")]
    pub formats: Vec<OutputFormat>,
    #[serde(deserialize_with = "parse_list")]
    pub content_versions: Vec<ContentVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    pub default_slot: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub timeout_ms: u64,
}

impl HandlerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlConfig {
    pub inline_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Deserialize a list of strings through `FromStr`, failing on the first bad entry.
fn parse_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|raw| raw.parse().map_err(de::Error::custom))
        .collect()
}

impl From<&RewikiConfig> for MessageCatalog {
    fn from(config: &RewikiConfig) -> Self {
        config
            .messages
            .iter()
            .map(|(key, text)| (key.clone(), text.clone()))
            .collect()
    }
}

impl From<&RewikiConfig> for HandlerSettings {
    fn from(config: &RewikiConfig) -> Self {
        HandlerSettings {
            supported_formats: config.negotiation.formats.clone(),
            supported_versions: config.negotiation.content_versions.clone(),
            default_slot: config.resolver.default_slot.clone(),
            timeout: config.handler.timeout(),
            inline_data: config.html.inline_data,
            localizer: Arc::new(MessageCatalog::from(config)),
        }
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<RewikiConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<RewikiConfig, ConfigError> {
    Loader::new().build()
}
