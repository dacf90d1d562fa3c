//! Request handling
//!
//! [`RequestHandler::handle`] runs one request from start to finish:
//!
//! 1. Resolve the page and negotiate the output in parallel. Both must
//!    succeed before any conversion starts.
//! 2. A plain markup fetch returns the stored bytes with a `content-model`
//!    header and never reaches the engine.
//! 3. Everything else goes through the [`TransformationEngine`] and is
//!    serialized in the negotiated format and version.
//!
//! Each request builds its own resolver, so nothing cached leaks between
//! requests. When the timeout passes, the work done so far is dropped and
//! the request fails with `timeout`.

use crate::annotations::{Localizer, MessageCatalog};
use crate::error::FormatError;
use crate::formats::html::{read_html, serialize_to_html, ExternalData, HtmlOptions};
use crate::formats::pagebundle::PageBundle;
use crate::formats::wikitext::WIKITEXT_MODEL;
use crate::ir::Document;
use crate::negotiate::{
    default_content_versions, negotiate, ContentVersion, NegotiatedFormat, NegotiationError,
    OutputFormat,
};
use crate::resolver::{
    ContentSource, PageConfigResolver, ResolveError, ResolvedPage, RevisionSelector, MAIN_SLOT,
};
use crate::transforms::{
    Conversion, ConversionState, TransformOptions, TransformationEngine, WikitextEngine,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Name of the response header carrying the content model.
pub const CONTENT_MODEL_HEADER: &str = "content-model";

/// Machine-readable failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnsupportedFormat,
    NotAcceptable,
    PageMissing,
    RevisionMissing,
    SlotMissing,
    BadRequest,
    ContentUnavailable,
    Timeout,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported-format",
            Self::NotAcceptable => "not-acceptable",
            Self::PageMissing => "page-missing",
            Self::RevisionMissing => "revision-missing",
            Self::SlotMissing => "slot-missing",
            Self::BadRequest => "bad-request",
            Self::ContentUnavailable => "content-unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal-error",
        }
    }

    pub fn status(self) -> u16 {
        match self {
            Self::UnsupportedFormat | Self::PageMissing | Self::RevisionMissing | Self::SlotMissing => 404,
            Self::NotAcceptable => 406,
            Self::BadRequest => 400,
            Self::ContentUnavailable => 503,
            Self::Timeout => 504,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request: one status, one cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} {code}: {message}")]
pub struct HttpError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl HttpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status(),
            code,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "status": self.status,
            "code": self.code.as_str(),
            "message": self.message,
        })
    }
}

impl From<NegotiationError> for HttpError {
    fn from(error: NegotiationError) -> Self {
        let code = match error {
            NegotiationError::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            NegotiationError::NotAcceptable { .. } | NegotiationError::NoSupportedVersions => {
                ErrorCode::NotAcceptable
            }
        };
        Self::new(code, error.to_string())
    }
}

impl From<ResolveError> for HttpError {
    fn from(error: ResolveError) -> Self {
        let code = match error {
            ResolveError::InvalidTitle { .. } => ErrorCode::BadRequest,
            ResolveError::PageMissing { .. } => ErrorCode::PageMissing,
            ResolveError::RevisionMissing { .. } => ErrorCode::RevisionMissing,
            ResolveError::SlotMissing { .. } => ErrorCode::SlotMissing,
            ResolveError::Unavailable(_) => ErrorCode::ContentUnavailable,
        };
        Self::new(code, error.to_string())
    }
}

/// Content sent along with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Markup to convert instead of the stored revision
    Wikitext(Vec<u8>),
    Html(String),
    PageBundle(String),
}

impl RequestBody {
    /// HTML or page bundle, i.e. the document → markup direction.
    pub fn is_reverse(&self) -> bool {
        !matches!(self, Self::Wikitext(_))
    }
}

/// Transport-agnostic request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub domain: String,
    pub title: String,
    pub format: String,
    /// Revision id or `latest`; absent means latest
    pub revision: Option<String>,
    pub slot: Option<String>,
    /// Preferred content versions, most wanted first
    pub accept: Vec<ContentVersion>,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn new(
        domain: impl Into<String>,
        title: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            title: title.into(),
            format: format.into(),
            ..Self::default()
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_accept(mut self, versions: impl IntoIterator<Item = ContentVersion>) -> Self {
        self.accept.extend(versions);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Final conversion state; `None` when nothing was converted
    pub state: Option<ConversionState>,
    pub version: Option<ContentVersion>,
}

impl Response {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Handler configuration.
#[derive(Clone)]
pub struct HandlerSettings {
    pub supported_formats: Vec<OutputFormat>,
    pub supported_versions: Vec<ContentVersion>,
    pub default_slot: String,
    /// Overall request timeout; `None` waits forever
    pub timeout: Option<Duration>,
    /// Emit annotations inline in the `html` format
    pub inline_data: bool,
    pub localizer: Arc<dyn Localizer>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            supported_formats: OutputFormat::ALL.to_vec(),
            supported_versions: default_content_versions(),
            default_slot: MAIN_SLOT.to_string(),
            timeout: None,
            inline_data: true,
            localizer: Arc::new(MessageCatalog::new()),
        }
    }
}

impl fmt::Debug for HandlerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSettings")
            .field("supported_formats", &self.supported_formats)
            .field("supported_versions", &self.supported_versions)
            .field("default_slot", &self.default_slot)
            .field("timeout", &self.timeout)
            .field("inline_data", &self.inline_data)
            .finish_non_exhaustive()
    }
}

pub struct RequestHandler<E = WikitextEngine> {
    source: Arc<dyn ContentSource>,
    engine: E,
    settings: HandlerSettings,
}

impl RequestHandler<WikitextEngine> {
    pub fn new(source: Arc<dyn ContentSource>, settings: HandlerSettings) -> Self {
        Self::with_engine(source, WikitextEngine, settings)
    }
}

/// Tracks the request deadline.
struct Deadline(Option<Instant>);

impl Deadline {
    fn check(&self, stage: &str) -> Result<(), HttpError> {
        match self.0 {
            Some(at) if Instant::now() > at => {
                tracing::warn!(stage, "request timed out, discarding work");
                Err(HttpError::new(
                    ErrorCode::Timeout,
                    format!("request timed out during {stage}"),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl<E: TransformationEngine> RequestHandler<E> {
    pub fn with_engine(source: Arc<dyn ContentSource>, engine: E, settings: HandlerSettings) -> Self {
        Self {
            source,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    #[tracing::instrument(
        skip(self, request),
        fields(domain = %request.domain, title = %request.title, format = %request.format)
    )]
    pub fn handle(&self, request: &Request) -> Result<Response, HttpError> {
        let deadline = Deadline(self.settings.timeout.map(|t| Instant::now() + t));
        let revision: RevisionSelector = request
            .revision
            .as_deref()
            .unwrap_or("latest")
            .parse()
            .map_err(|e: crate::resolver::RevisionParseError| {
                HttpError::new(ErrorCode::BadRequest, e.to_string())
            })?;
        let slot = request
            .slot
            .as_deref()
            .unwrap_or(&self.settings.default_slot);

        // Stored content is needed for a forward conversion of the stored
        // revision, and as the diff base of a reverse conversion that names
        // its revision.
        let needs_page = match &request.body {
            None => true,
            Some(body) => body.is_reverse() && matches!(revision, RevisionSelector::Id(_)),
        };

        let resolver = PageConfigResolver::new(self.source.as_ref());
        let (negotiated, page) = thread::scope(|scope| {
            let resolution = needs_page.then(|| {
                scope.spawn(|| resolver.resolve(&request.domain, &request.title, revision, slot))
            });
            let negotiated = negotiate(
                &request.format,
                &request.accept,
                &self.settings.supported_formats,
                &self.settings.supported_versions,
            );
            let page = resolution.map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ResolveError::Unavailable("resolution panicked".to_string()))
                })
            });
            (negotiated, page)
        });
        let negotiated = negotiated?;
        let page = page.transpose()?;
        deadline.check("resolution")?;

        if let (OutputFormat::Wikitext, None, Some(page)) =
            (negotiated.format, &request.body, &page)
        {
            tracing::debug!(revision_id = page.revision_id, "returning stored markup");
            return Ok(Response {
                status: 200,
                headers: vec![
                    (
                        "content-type".to_string(),
                        negotiated.format.content_type(&negotiated.version),
                    ),
                    (CONTENT_MODEL_HEADER.to_string(), page.content_model.clone()),
                ],
                body: page.content.to_vec(),
                state: None,
                version: None,
            });
        }

        let mut conversion = Conversion::new();
        conversion.begin().map_err(internal)?;
        let doc = self.input_document(request, page.as_deref())?;
        deadline.check("conversion")?;
        let state = conversion.finish(&doc).map_err(internal)?;

        let title = page
            .as_ref()
            .map_or_else(|| request.title.clone(), |p| p.title.text().to_string());
        let body = self.output(&doc, &negotiated, &title, page.as_deref())?;
        deadline.check("serialization")?;

        tracing::info!(%state, errors = doc.error_count(), bytes = body.len(), "request complete");
        Ok(Response {
            status: 200,
            headers: vec![
                (
                    "content-type".to_string(),
                    negotiated.format.content_type(&negotiated.version),
                ),
                (
                    CONTENT_MODEL_HEADER.to_string(),
                    doc.content_model().to_string(),
                ),
            ],
            body,
            state: Some(state),
            version: Some(negotiated.version),
        })
    }

    fn input_document(
        &self,
        request: &Request,
        page: Option<&ResolvedPage>,
    ) -> Result<Document, HttpError> {
        let options = TransformOptions::default();
        match (&request.body, page) {
            (Some(RequestBody::Wikitext(markup)), _) => {
                Ok(self
                    .engine
                    .markup_to_document(markup, WIKITEXT_MODEL, &options))
            }
            (Some(RequestBody::Html(html)), _) => {
                let parsed = read_html(html, ExternalData::default()).map_err(bad_request)?;
                Ok(parsed.document)
            }
            (Some(RequestBody::PageBundle(json)), _) => {
                let parsed = PageBundle::from_json(json)
                    .and_then(|bundle| bundle.to_document())
                    .map_err(bad_request)?;
                Ok(parsed.document)
            }
            (None, Some(page)) => Ok(self.engine.markup_to_document(
                &page.content,
                &page.content_model,
                &options,
            )),
            (None, None) => Err(HttpError::new(
                ErrorCode::BadRequest,
                "nothing to convert",
            )),
        }
    }

    fn output(
        &self,
        doc: &Document,
        negotiated: &NegotiatedFormat,
        title: &str,
        page: Option<&ResolvedPage>,
    ) -> Result<Vec<u8>, HttpError> {
        let html_options = HtmlOptions::default()
            .with_version(negotiated.version.to_string())
            .with_title(title)
            .with_inline_data(self.settings.inline_data)
            .with_localizer(Arc::clone(&self.settings.localizer));
        match negotiated.format {
            OutputFormat::Wikitext => {
                let original = page.map(|p| &*p.content);
                Ok(self.engine.document_to_markup(doc, original))
            }
            OutputFormat::Html => serialize_to_html(doc, &html_options)
                .map(String::into_bytes)
                .map_err(internal),
            OutputFormat::PageBundle => PageBundle::from_document(doc, &html_options)
                .and_then(|bundle| bundle.to_json())
                .map(String::into_bytes)
                .map_err(internal),
        }
    }
}

fn bad_request(error: FormatError) -> HttpError {
    HttpError::new(ErrorCode::BadRequest, error.to_string())
}

fn internal(error: impl fmt::Display) -> HttpError {
    HttpError::new(ErrorCode::Internal, error.to_string())
}
