//! Output format and content version negotiation
//!
//! [`negotiate`] is a pure function of the request and the supported sets:
//!
//! 1. The requested format must match a supported one exactly
//!    (case-sensitive), otherwise the request fails.
//! 2. No version preference: the newest supported version.
//! 3. The first preference, in the caller's order, that is supported wins.
//! 4. Otherwise the closest supported version not newer than a preference,
//!    trying preferences in order. A client is never upgraded past what it
//!    asked for; when every supported version is newer, the request is not
//!    acceptable.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base of the profile URLs in `Accept` and `Content-Type` headers.
pub const PROFILE_BASE: &str = "https://www.mediawiki.org/wiki/Specs/";

/// Content versions supported out of the box, oldest first.
pub const DEFAULT_CONTENT_VERSIONS: &[&str] = &["2.6.0", "2.7.0", "2.8.0"];

/// Closed set of output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Source markup, returned as stored
    Wikitext,
    Html,
    PageBundle,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Wikitext, Self::Html, Self::PageBundle];

    pub fn name(self) -> &'static str {
        match self {
            Self::Wikitext => "wikitext",
            Self::Html => "html",
            Self::PageBundle => "pagebundle",
        }
    }

    /// `Content-Type` of a response in this format.
    pub fn content_type(self, version: &ContentVersion) -> String {
        match self {
            Self::Wikitext => format!(
                "text/plain; charset=utf-8; profile=\"{PROFILE_BASE}wikitext/1.0.0\""
            ),
            Self::Html => {
                format!("text/html; charset=utf-8; profile=\"{PROFILE_BASE}HTML/{version}\"")
            }
            Self::PageBundle => format!(
                "application/json; charset=utf-8; profile=\"{PROFILE_BASE}pagebundle/{version}\""
            ),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| NegotiationError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A `major.minor.patch` content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid content version {0:?}")]
pub struct VersionParseError(String);

impl ContentVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ContentVersion {
    type Err = VersionParseError;

    /// Accepts `x.y.z`; a missing patch or minor part counts as 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionParseError(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, VersionParseError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let version = Self::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for ContentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse the built-in version list.
pub fn default_content_versions() -> Vec<ContentVersion> {
    DEFAULT_CONTENT_VERSIONS
        .iter()
        .filter_map(|v| v.parse().ok())
        .collect()
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub format: OutputFormat,
    pub version: ContentVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(String),
    #[error("no acceptable content version for {}", list(.requested))]
    NotAcceptable { requested: Vec<ContentVersion> },
    #[error("no content versions are configured")]
    NoSupportedVersions,
}

fn list(versions: &[ContentVersion]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn negotiate(
    requested_format: &str,
    preferences: &[ContentVersion],
    supported_formats: &[OutputFormat],
    supported_versions: &[ContentVersion],
) -> Result<NegotiatedFormat, NegotiationError> {
    let format = supported_formats
        .iter()
        .copied()
        .find(|format| format.name() == requested_format)
        .ok_or_else(|| NegotiationError::UnsupportedFormat(requested_format.to_string()))?;

    let newest = supported_versions
        .iter()
        .max()
        .copied()
        .ok_or(NegotiationError::NoSupportedVersions)?;

    let version = if preferences.is_empty() {
        newest
    } else if let Some(exact) = preferences.iter().find(|p| supported_versions.contains(p)) {
        *exact
    } else {
        preferences
            .iter()
            .find_map(|p| supported_versions.iter().filter(|v| *v <= p).max())
            .copied()
            .ok_or_else(|| NegotiationError::NotAcceptable {
                requested: preferences.to_vec(),
            })?
    };

    tracing::debug!(%format, %version, "negotiated output");
    Ok(NegotiatedFormat { format, version })
}

/// Ordered version preferences from an `Accept` header.
///
/// Each media range may carry `profile=".../Specs/<kind>/<version>"` and a
/// `q` weight. Ranges without a usable profile are ignored, as are ranges
/// with `q=0`. Higher weights come first; equal weights keep header order.
pub fn parse_accept(header: &str) -> Vec<ContentVersion> {
    let mut weighted: Vec<(f32, ContentVersion)> = Vec::new();
    for range in header.split(',') {
        let mut version = None;
        let mut q = 1.0_f32;
        for param in range.split(';').skip(1) {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match name.trim() {
                "profile" => version = profile_version(value),
                "q" => q = value.parse().unwrap_or(0.0),
                _ => {}
            }
        }
        match version {
            Some(version) if q > 0.0 => weighted.push((q, version)),
            Some(_) => {}
            None => tracing::debug!(range = range.trim(), "accept range without profile"),
        }
    }
    weighted.sort_by(|a, b| b.0.total_cmp(&a.0));
    weighted.into_iter().map(|(_, version)| version).collect()
}

fn profile_version(profile: &str) -> Option<ContentVersion> {
    let (_, path) = profile.split_once("/Specs/")?;
    let (_, version) = path.rsplit_once('/')?;
    version.parse().ok()
}
