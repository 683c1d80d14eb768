//! Endpoint discovery against the API root document.
//!
//! Hrefs are never assembled from hardcoded URL fragments. A slash
//! separated link path like `core/items` is resolved by fetching the
//! root document, following the `core` link, fetching that document,
//! and reading the `items` link from it. Every hop goes through the
//! orchestrator, so discovery documents are cached and deduplicated
//! like any other resource.

use chrono::Utc;
use tracing::{debug, instrument};

use quince_core::ResourceIdentity;

use crate::cache::CachedObject;
use crate::error::RemoteDataError;
use crate::request::{RequestDescriptor, RequestService, RequestState};

/// Resolves link paths to hrefs by walking the API's hypermedia graph.
///
/// Cloning shares the underlying request service and cache.
#[derive(Clone)]
pub struct HalEndpointService {
    service: RequestService,
    root_href: String,
    ms_to_live: u64,
}

impl HalEndpointService {
    /// Create a resolver rooted at `root_href`.
    ///
    /// Discovery documents are cached with `ms_to_live`; within that
    /// window repeated lookups cost no network calls.
    #[must_use]
    pub fn new(service: RequestService, root_href: impl Into<String>, ms_to_live: u64) -> Self {
        Self {
            service,
            root_href: root_href.into(),
            ms_to_live,
        }
    }

    /// The root href discovery starts from.
    #[must_use]
    pub fn root_href(&self) -> &str {
        &self.root_href
    }

    /// Resolve a slash separated link path to the href it points at.
    ///
    /// The final href is returned without being fetched; only the
    /// documents along the way are retrieved.
    ///
    /// # Errors
    ///
    /// [`RemoteDataError::NotConfigured`] when a segment is not a link
    /// relation of the document reached so far; any fetch failure along
    /// the walk is propagated unchanged.
    #[instrument(skip(self))]
    pub async fn href_for(&self, link_path: &str) -> Result<String, RemoteDataError> {
        let mut current = self.root_href.clone();

        for segment in link_path.split('/').filter(|s| !s.is_empty()) {
            let document = self.fetch(&current).await?;
            match document.links.href(segment) {
                Some(href) => {
                    debug!(segment, href, "Resolved link segment");
                    current = href.to_string();
                }
                None => {
                    return Err(RemoteDataError::NotConfigured(format!(
                        "No link '{segment}' configured at {current}"
                    )));
                }
            }
        }

        Ok(current)
    }

    async fn fetch(&self, href: &str) -> Result<CachedObject, RemoteDataError> {
        // Fresh cached representation first; discovery never forces
        // a re-issue on staleness.
        let identity = ResourceIdentity::from(href);
        if let Some(object) = self.service.cache().get(&identity)
            && !object.is_stale(Utc::now())
        {
            return Ok(object);
        }

        let configured = self.service.configure(RequestDescriptor::get(
            RequestService::generate_request_id(),
            href,
            self.ms_to_live,
            false,
        ));
        let mut entry_rx = configured.entry;
        let entry = loop {
            let entry = entry_rx.borrow_and_update().clone();
            if entry.is_terminal() {
                break entry;
            }
            if entry_rx.changed().await.is_err() {
                return Err(RemoteDataError::Transport(
                    "request tracker went away".to_string(),
                ));
            }
        };

        match entry.state {
            RequestState::Success { identity, .. } => {
                let identity = identity.unwrap_or_else(|| ResourceIdentity::from(href));
                self.service.cache().get(&identity).ok_or_else(|| {
                    RemoteDataError::Decode(format!("no cached object for {identity}"))
                })
            }
            RequestState::Error(error) => Err(error),
            RequestState::Pending => unreachable!("loop exits on terminal states only"),
        }
    }
}
