//! Collection and document fetching for the sidebar and selectors.
//!
//! The collection list is paged lazily through [`CollectionPager`]: the first
//! page is always requested and its `meta.total_pages` bounds the iteration;
//! later pages are requested one at a time as the caller pulls them.
//!
//! # Failure policy
//!
//! | Failure | Result |
//! |---------|--------|
//! | Any page fails (transport, status, JSON) | Collections accumulated so far, unsorted and unpopulated |
//! | First page has no `meta` | That page's collections, as a partial list |
//! | Any per-collection document fetch fails | `None` for the whole listing |
//!
//! [`fetch_collections`] keeps the cause in a [`ListOutcome`];
//! [`list_collections`] flattens it into what the UI renders.

use crate::backend::{Backend, BackendError};
use crate::models::{Collection, CollectionListPage, Document};

/// Result of a listing, with the failure cause kept for logging and tests.
#[derive(Debug)]
pub enum ListOutcome {
    /// Every page (and, when requested, every document list) was fetched.
    Complete(Vec<Collection>),
    /// Paging stopped early; `collections` holds what was accumulated.
    Partial {
        collections: Vec<Collection>,
        error: BackendError,
    },
    /// Document population was requested and one of the fetches failed.
    PopulationFailed(BackendError),
}

impl ListOutcome {
    pub fn into_collections(self) -> Option<Vec<Collection>> {
        match self {
            ListOutcome::Complete(collections) => Some(collections),
            ListOutcome::Partial { collections, .. } => Some(collections),
            ListOutcome::PopulationFailed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&BackendError> {
        match self {
            ListOutcome::Complete(_) => None,
            ListOutcome::Partial { error, .. } => Some(error),
            ListOutcome::PopulationFailed(error) => Some(error),
        }
    }
}

/// Lazy pager over `GET /collection/list`.
pub struct CollectionPager<'a> {
    backend: &'a dyn Backend,
    next: u32,
    total_pages: Option<u32>,
    /// Reported on the call after a first page without `meta`.
    pending: Option<BackendError>,
    done: bool,
}

impl<'a> CollectionPager<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            next: 1,
            total_pages: None,
            pending: None,
            done: false,
        }
    }

    /// Request the next page, or `None` once `total_pages` is exhausted.
    ///
    /// After an error the pager is finished.
    pub async fn next_page(&mut self) -> Option<Result<CollectionListPage, BackendError>> {
        if self.done {
            return None;
        }
        if let Some(error) = self.pending.take() {
            self.done = true;
            return Some(Err(error));
        }
        if let Some(total) = self.total_pages {
            if self.next > total {
                self.done = true;
                return None;
            }
        }

        let result = self.backend.collection_page(self.next).await;
        match &result {
            Ok(page) => {
                // Only the first page's count is trusted.
                if self.next == 1 {
                    match page.meta {
                        Some(meta) => self.total_pages = Some(meta.total_pages),
                        None => {
                            self.pending = Some(BackendError::Decode {
                                endpoint: "/collection/list".to_string(),
                                message: "first page has no meta.total_pages".to_string(),
                            })
                        }
                    }
                }
                self.next += 1;
            }
            Err(_) => self.done = true,
        }
        Some(result)
    }
}

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Fetch the collection list, optionally with each collection's documents.
pub async fn fetch_collections(backend: &dyn Backend, populate_documents: bool) -> ListOutcome {
    let mut collections = Vec::new();
    let mut pager = CollectionPager::new(backend);

    while let Some(page) = pager.next_page().await {
        match page {
            Ok(page) => collections.extend(
                page.collections
                    .into_iter()
                    .map(|entry| Collection::new(capitalize(&entry.name), entry.uuid)),
            ),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    accumulated = collections.len(),
                    "collection paging failed, returning partial list"
                );
                return ListOutcome::Partial { collections, error };
            }
        }
    }

    if populate_documents {
        return match populate(backend, &mut collections).await {
            Ok(()) => ListOutcome::Complete(collections),
            Err(error) => {
                tracing::warn!(error = %error, "document population failed");
                ListOutcome::PopulationFailed(error)
            }
        };
    }

    collections.sort_by(|a, b| a.label.cmp(&b.label));
    ListOutcome::Complete(collections)
}

/// Fetch the collection list, flattened for rendering.
///
/// `None` means document population failed; an empty list means nothing
/// could be fetched.
pub async fn list_collections(
    backend: &dyn Backend,
    populate_documents: bool,
) -> Option<Vec<Collection>> {
    fetch_collections(backend, populate_documents)
        .await
        .into_collections()
}

async fn populate(backend: &dyn Backend, collections: &mut [Collection]) -> Result<(), BackendError> {
    for collection in collections.iter_mut() {
        let detail = backend.collection_documents(&collection.value).await?;
        let names = detail.documents.unwrap_or_default();
        if !names.is_empty() {
            collection.children = Some(names.into_iter().map(Document::new).collect());
        }
    }
    Ok(())
}
