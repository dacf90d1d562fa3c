//! Round-trip conversion between wiki markup and annotated HTML
//!
//!     This crate turns wikitext into an HTML document and back again. Going back must
//!     reproduce the original source byte for byte when the HTML was not edited, and change
//!     only the edited spans when it was. Ordinary markup → HTML converters are lossy; this one
//!     carries enough out-of-band data next to the HTML to rebuild the exact source.
//!
//!     TLDR:
//!         - Every conversion goes through the document tree in ./ir. Formats read it or build it.
//!         - Metadata never lives in the visible tree. It goes into the annotation store owned
//!           by the document, keyed by node id, in two namespaces: round-trip hints
//!           (`data-parsoid`) and semantic data (`data-mw`).
//!         - A construct that cannot be converted cleanly becomes an error envelope on its node.
//!           The page still renders.
//!         - Everything that leaves the process (annotations, envelopes, page bundles) is written
//!           through the codec in ./codec.
//!
//! Architecture
//!
//!     A request flows through four layers:
//!
//!         request ─┬─ resolver (page, revision, slot → bytes) ─┐
//!                  └─ negotiator (format, version)  ───────────┴─ engine ─ format ─ response
//!
//!     Resolution and negotiation are independent and run in parallel; the engine starts when
//!     both are done. See ./handler.rs.
//!
//!     This is a pure lib: no code here assumes a shell, prints, or reads the environment. The
//!     rewiki-cli crate is the shell around it.
//!
//!     The file structure :
//!     .
//!     ├── error.rs                # FormatError
//!     ├── format.rs               # Format trait definition
//!     ├── registry.rs             # FormatRegistry for discovery and selection
//!     ├── title.rs                # Page title normalization
//!     ├── codec                   # JSON codec and the value model it encodes
//!     ├── annotations             # Annotation store, source ranges, error envelopes
//!     ├── ir                      # Document tree (arena keyed by node id)
//!     ├── formats
//!     │   ├── wikitext            # Reference wikitext engine
//!     │   ├── html                # Annotated HTML (html5ever)
//!     │   └── pagebundle          # HTML + out-of-band annotations as JSON
//!     ├── transforms.rs           # Transformation engine contract, conversion states
//!     ├── resolver.rs             # Content source and request-scoped resolver
//!     ├── negotiate.rs            # Output format / content version negotiation
//!     └── handler.rs              # Request orchestration
//!
//! Testing
//!     tests
//!     ├── lib.rs
//!     ├── roundtrip
//!     ├── codec
//!     ├── html
//!     └── handler
//!
//!     Rust does not discover tests in subdirectories by default, so tests/lib.rs includes them.
//!
//! Round-trip fidelity
//!
//!     The engine records a DOM source range (`dsr`) for every element: start and end offsets
//!     in the source plus the widths of the opening and closing markup. Serializing back with
//!     the original at hand, every subtree that is structurally equal to the same node of the
//!     re-parsed original is copied from the original slice. Only nodes that differ are
//!     written fresh, reusing their original opening and closing markup where the kind did not
//!     change. Gaps between siblings that were adjacent in the original are copied too.
//!
//! Error envelopes
//!
//!     `{ "key": ..., "message"?: ..., "params"?: [...] }`. The key is a message id looked up
//!     through a [`annotations::Localizer`]; `message` is the fallback text. Envelopes compare by
//!     value and clone by round-tripping their params through the codec.
//!
pub mod annotations;
pub mod codec;
pub mod error;
pub mod format;
pub mod formats;
pub mod handler;
pub mod ir;
pub mod negotiate;
pub mod registry;
pub mod resolver;
pub mod title;
pub mod transforms;

pub use annotations::{
    AnnotationError, AnnotationStore, DomSourceRange, ErrorEnvelope, Localizer, MessageCatalog,
    Namespace,
};
pub use codec::{Codec, CodecValue, DecodeError, JsonCodecable};
pub use error::FormatError;
pub use format::Format;
pub use handler::{
    ErrorCode, HandlerSettings, HttpError, Request, RequestBody, RequestHandler, Response,
};
pub use ir::{Document, NodeId, NodeKind};
pub use negotiate::{negotiate, ContentVersion, NegotiatedFormat, NegotiationError, OutputFormat};
pub use registry::FormatRegistry;
pub use resolver::{
    ContentSource, InMemoryContentSource, PageConfigResolver, ResolveError, ResolvedPage,
    RevisionSelector,
};
pub use title::PageTitle;
pub use transforms::{Conversion, ConversionState, TransformationEngine, WikitextEngine};
