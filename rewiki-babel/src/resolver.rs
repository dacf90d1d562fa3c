//! Page resolution
//!
//!     A [`ContentSource`] is the storage service: it hands out immutable
//!     slot content for (domain, title, revision, slot). The
//!     [`PageConfigResolver`] sits in front of it for the lifetime of one
//!     request and memoizes every resolution, so two lookups of the same
//!     tuple observe the same bytes even if the store changes in between.
//!
//!     A resolver is never shared between requests; create one per request.

use crate::title::{PageTitle, TitleError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Slot used when a request names none.
pub const MAIN_SLOT: &str = "main";

/// Which revision of a page to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RevisionSelector {
    /// The current revision at resolution time
    #[default]
    Latest,
    Id(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid revision {0:?}: expected a number or \"latest\"")]
pub struct RevisionParseError(String);

impl FromStr for RevisionSelector {
    type Err = RevisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse()
            .map(Self::Id)
            .map_err(|_| RevisionParseError(s.to_string()))
    }
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Content of one slot of one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotContent {
    pub revision_id: u64,
    pub content_model: String,
    pub content: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentLookupError {
    #[error("page does not exist")]
    PageMissing,
    #[error("revision does not exist")]
    RevisionMissing,
    #[error("slot does not exist")]
    SlotMissing,
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

/// Page storage, consulted through this interface only.
pub trait ContentSource: Send + Sync {
    fn fetch(
        &self,
        domain: &str,
        title: &PageTitle,
        revision: RevisionSelector,
        slot: &str,
    ) -> Result<SlotContent, ContentLookupError>;
}

/// A concrete unit of work: what content, from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub domain: String,
    pub title: PageTitle,
    /// The selector the caller asked for
    pub revision: RevisionSelector,
    /// The revision it resolved to
    pub revision_id: u64,
    pub slot: String,
    pub content_model: String,
    pub content: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid title {title:?}: {source}")]
    InvalidTitle {
        title: String,
        #[source]
        source: TitleError,
    },
    #[error("page {title} does not exist on {domain}")]
    PageMissing { domain: String, title: PageTitle },
    #[error("revision {revision} of page {title} does not exist")]
    RevisionMissing {
        title: PageTitle,
        revision: RevisionSelector,
    },
    #[error("slot {slot:?} does not exist in revision {revision} of page {title}")]
    SlotMissing {
        title: PageTitle,
        revision: RevisionSelector,
        slot: String,
    },
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

type CacheKey = (String, String, RevisionSelector, String);

/// Request-scoped, memoizing front of a [`ContentSource`].
pub struct PageConfigResolver<'a> {
    source: &'a dyn ContentSource,
    cache: Mutex<HashMap<CacheKey, Arc<ResolvedPage>>>,
}

impl<'a> PageConfigResolver<'a> {
    pub fn new(source: &'a dyn ContentSource) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a page, fetching it on first access only.
    ///
    /// Repeated calls with the same tuple return the same `Arc`. Failures
    /// are not cached.
    pub fn resolve(
        &self,
        domain: &str,
        title: &str,
        revision: RevisionSelector,
        slot: &str,
    ) -> Result<Arc<ResolvedPage>, ResolveError> {
        let title = PageTitle::new(title).map_err(|source| ResolveError::InvalidTitle {
            title: title.to_string(),
            source,
        })?;
        let key = (
            domain.to_string(),
            title.db_key(),
            revision,
            slot.to_string(),
        );

        // The lock is held across the fetch so concurrent callers in one
        // request wait for the first fetch instead of racing it.
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(page) = cache.get(&key) {
            tracing::debug!(%title, %revision, slot, "resolution cache hit");
            return Ok(Arc::clone(page));
        }

        let fetched = self
            .source
            .fetch(domain, &title, revision, slot)
            .map_err(|error| match error {
                ContentLookupError::PageMissing => ResolveError::PageMissing {
                    domain: domain.to_string(),
                    title: title.clone(),
                },
                ContentLookupError::RevisionMissing => ResolveError::RevisionMissing {
                    title: title.clone(),
                    revision,
                },
                ContentLookupError::SlotMissing => ResolveError::SlotMissing {
                    title: title.clone(),
                    revision,
                    slot: slot.to_string(),
                },
                ContentLookupError::Unavailable(reason) => ResolveError::Unavailable(reason),
            })?;
        tracing::debug!(
            %title,
            revision_id = fetched.revision_id,
            bytes = fetched.content.len(),
            "resolved page"
        );

        let page = Arc::new(ResolvedPage {
            domain: domain.to_string(),
            title,
            revision,
            revision_id: fetched.revision_id,
            slot: slot.to_string(),
            content_model: fetched.content_model,
            content: fetched.content,
        });
        cache.insert(key, Arc::clone(&page));
        Ok(page)
    }

    /// Number of distinct resolutions made so far.
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid store file: {0}")]
    Json(String),
    #[error("invalid title {title:?} in store: {source}")]
    InvalidTitle {
        title: String,
        #[source]
        source: TitleError,
    },
}

#[derive(Debug, Clone, Default)]
struct StoredRevision {
    id: u64,
    slots: BTreeMap<String, (String, Arc<[u8]>)>,
}

/// A [`ContentSource`] held in memory, loadable from JSON:
///
/// ```json
/// { "domains": { "en.example.org": { "Main Page": [
///     { "id": 1, "slots": { "main": { "model": "wikitext", "content": "Hi" } } }
/// ] } } }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryContentSource {
    pages: RwLock<HashMap<(String, String), Vec<StoredRevision>>>,
}

#[derive(Deserialize)]
struct StoreFile {
    #[serde(default)]
    domains: BTreeMap<String, BTreeMap<String, Vec<RevisionFile>>>,
}

#[derive(Deserialize)]
struct RevisionFile {
    id: u64,
    #[serde(default)]
    slots: BTreeMap<String, SlotFile>,
}

#[derive(Deserialize)]
struct SlotFile {
    #[serde(default = "default_model")]
    model: String,
    content: String,
}

fn default_model() -> String {
    crate::formats::wikitext::WIKITEXT_MODEL.to_string()
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: StoreFile =
            serde_json::from_str(json).map_err(|e| StoreError::Json(e.to_string()))?;
        let store = Self::new();
        for (domain, pages) in file.domains {
            for (raw_title, revisions) in pages {
                let title = PageTitle::new(&raw_title).map_err(|source| {
                    StoreError::InvalidTitle {
                        title: raw_title.clone(),
                        source,
                    }
                })?;
                store.insert_page(&domain, &title);
                for revision in revisions {
                    store.insert_empty_revision(&domain, &title, revision.id);
                    for (slot, content) in revision.slots {
                        store.insert_revision(
                            &domain,
                            &title,
                            revision.id,
                            &slot,
                            &content.model,
                            content.content.into_bytes(),
                        );
                    }
                }
            }
        }
        Ok(store)
    }

    /// Create a page without revisions.
    pub fn insert_page(&self, domain: &str, title: &PageTitle) {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        pages
            .entry((domain.to_string(), title.db_key()))
            .or_default();
    }

    /// Create a revision without slots, creating the page as needed.
    pub fn insert_empty_revision(&self, domain: &str, title: &PageTitle, revision_id: u64) {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        let revisions = pages
            .entry((domain.to_string(), title.db_key()))
            .or_default();
        revision_mut(revisions, revision_id);
    }

    /// Store one slot of a revision, creating page and revision as needed.
    pub fn insert_revision(
        &self,
        domain: &str,
        title: &PageTitle,
        revision_id: u64,
        slot: &str,
        content_model: &str,
        content: impl Into<Vec<u8>>,
    ) {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        let revisions = pages
            .entry((domain.to_string(), title.db_key()))
            .or_default();
        let content: Vec<u8> = content.into();
        revision_mut(revisions, revision_id).slots.insert(
            slot.to_string(),
            (content_model.to_string(), Arc::from(content)),
        );
    }
}

/// The revision with `id`, inserted in id order if absent.
fn revision_mut(revisions: &mut Vec<StoredRevision>, id: u64) -> &mut StoredRevision {
    let index = match revisions.binary_search_by_key(&id, |r| r.id) {
        Ok(index) => index,
        Err(index) => {
            revisions.insert(
                index,
                StoredRevision {
                    id,
                    slots: BTreeMap::new(),
                },
            );
            index
        }
    };
    &mut revisions[index]
}

impl ContentSource for InMemoryContentSource {
    fn fetch(
        &self,
        domain: &str,
        title: &PageTitle,
        revision: RevisionSelector,
        slot: &str,
    ) -> Result<SlotContent, ContentLookupError> {
        let pages = self.pages.read().unwrap_or_else(PoisonError::into_inner);
        let revisions = pages
            .get(&(domain.to_string(), title.db_key()))
            .ok_or(ContentLookupError::PageMissing)?;
        let stored = match revision {
            RevisionSelector::Latest => revisions.last(),
            RevisionSelector::Id(id) => revisions.iter().find(|r| r.id == id),
        }
        .ok_or(ContentLookupError::RevisionMissing)?;
        let (content_model, content) = stored
            .slots
            .get(slot)
            .ok_or(ContentLookupError::SlotMissing)?;
        Ok(SlotContent {
            revision_id: stored.id,
            content_model: content_model.clone(),
            content: Arc::clone(content),
        })
    }
}
