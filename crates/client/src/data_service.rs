//! Typed data services over the remote data builder.
//!
//! A [`DataService`] binds a decodable model type to the link path its
//! endpoint lives at, so callers fetch by id or by listing options and
//! never assemble hrefs by hand. Writes go through JSON-Patch: callers
//! hand over the original and the edited version, the change analyzer
//! produces the operations, and the orchestrator handles invalidation.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use quince_core::{PaginatedList, PatchOperation};

use crate::endpoint::HalEndpointService;
use crate::error::RemoteDataError;
use crate::patch::{PatchAccumulator, diff};
use crate::remote::{FollowLinkConfig, RemoteDataBuildService, RemoteDataWatch};
use crate::request::{RequestDescriptor, RequestEntry, RequestService, RequestState};

/// Pagination, sorting, and search parameters for listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct FindListOptions {
    /// Zero-based page index.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
    /// Sort expression, e.g. `dc.title,ASC`.
    pub sort: Option<String>,
    /// Extra query parameters appended verbatim.
    pub search_params: Vec<(String, String)>,
}

impl FindListOptions {
    /// Apply these options to `href` as query parameters.
    ///
    /// # Errors
    ///
    /// [`RemoteDataError::NotConfigured`] when `href` is not a valid URL.
    pub fn apply_to(&self, href: &str) -> Result<String, RemoteDataError> {
        let mut url = Url::parse(href)
            .map_err(|e| RemoteDataError::NotConfigured(format!("Invalid href {href}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(page) = self.page {
                pairs.append_pair("page", &page.to_string());
            }
            if let Some(size) = self.size {
                pairs.append_pair("size", &size.to_string());
            }
            if let Some(sort) = &self.sort {
                pairs.append_pair("sort", sort);
            }
            for (key, value) in &self.search_params {
                pairs.append_pair(key, value);
            }
        }
        // An untouched serializer leaves an empty query behind
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.into())
    }
}

/// A typed service for one resource family rooted at a link path.
///
/// Cloning shares the underlying builder and endpoint resolver.
#[derive(Clone)]
pub struct DataService<T> {
    builder: RemoteDataBuildService,
    endpoint: HalEndpointService,
    link_path: String,
    ms_to_live: u64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> DataService<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a service for the resource family at `link_path`.
    #[must_use]
    pub fn new(
        builder: RemoteDataBuildService,
        endpoint: HalEndpointService,
        link_path: impl Into<String>,
        ms_to_live: u64,
    ) -> Self {
        Self {
            builder,
            endpoint,
            link_path: link_path.into(),
            ms_to_live,
            _marker: std::marker::PhantomData,
        }
    }

    /// The link path this service resolves its endpoint from.
    #[must_use]
    pub fn link_path(&self) -> &str {
        &self.link_path
    }

    fn request_service(&self) -> &RequestService {
        self.builder.request_service()
    }

    /// Fetch a single resource at a known href.
    #[must_use]
    pub fn find_by_href(
        &self,
        href: &str,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
    ) -> RemoteDataWatch<T> {
        self.builder
            .build_single(href, self.ms_to_live, re_request_on_stale, links_to_follow)
    }

    /// Fetch a single resource by id under this service's endpoint.
    ///
    /// # Errors
    ///
    /// Endpoint resolution failures are returned before any fetch of the
    /// resource itself starts.
    #[instrument(skip(self, links_to_follow))]
    pub async fn find_by_id(
        &self,
        id: &str,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
    ) -> Result<RemoteDataWatch<T>, RemoteDataError> {
        let endpoint = self.endpoint.href_for(&self.link_path).await?;
        let href = format!("{}/{id}", endpoint.trim_end_matches('/'));
        Ok(self.find_by_href(&href, re_request_on_stale, links_to_follow))
    }

    /// Fetch a page of resources from this service's listing endpoint.
    ///
    /// # Errors
    ///
    /// Endpoint resolution failures and invalid hrefs are returned before
    /// the listing fetch starts.
    #[instrument(skip(self, links_to_follow))]
    pub async fn find_all(
        &self,
        options: &FindListOptions,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
    ) -> Result<RemoteDataWatch<PaginatedList<T>>, RemoteDataError> {
        let endpoint = self.endpoint.href_for(&self.link_path).await?;
        let href = options.apply_to(&endpoint)?;
        Ok(self
            .builder
            .build_list(&href, self.ms_to_live, re_request_on_stale, links_to_follow))
    }

    /// Send a JSON-Patch batch to `href`.
    ///
    /// On success the orchestrator has already invalidated the cached
    /// representation and flagged the tracked GET entry stale; the next
    /// read re-fetches.
    ///
    /// # Errors
    ///
    /// A rejected batch surfaces as [`RemoteDataError::PatchRejected`];
    /// the batch is discarded and the caller must re-diff against fresh
    /// data. Transport failures are propagated unchanged.
    #[instrument(skip(self, operations), fields(operations = operations.len()))]
    pub async fn patch(
        &self,
        href: &str,
        operations: &[PatchOperation],
    ) -> Result<(), RemoteDataError> {
        if operations.is_empty() {
            return Ok(());
        }

        let configured = self.request_service().configure(RequestDescriptor::patch(
            RequestService::generate_request_id(),
            href,
            operations,
        ));
        match await_write(configured.entry).await {
            Err(RemoteDataError::HttpStatus { status, message }) => Err(
                RemoteDataError::PatchRejected(format!("HTTP {status}: {message}")),
            ),
            other => other,
        }
    }

    /// Drain an edit session and send the batch as one PATCH request.
    ///
    /// The queue empties synchronously, so edits arriving while the
    /// batch is on the wire start a fresh batch. The session returns to
    /// Idle (or Accumulating, when such edits exist) once the response
    /// lands, success and failure alike: a rejected batch is discarded,
    /// never retried from here.
    ///
    /// # Errors
    ///
    /// Same as [`DataService::patch`].
    #[instrument(skip(self, accumulator))]
    pub async fn flush_edits(
        &self,
        href: &str,
        accumulator: &mut PatchAccumulator,
    ) -> Result<Vec<PatchOperation>, RemoteDataError> {
        let batch = accumulator.flush();
        if batch.is_empty() {
            return Ok(batch);
        }
        let result = self.patch(href, &batch).await;
        accumulator.complete();
        result.map(|()| batch)
    }

    /// POST a new resource to this service's listing endpoint.
    ///
    /// On success every tracked request under the endpoint is marked
    /// stale, so listings re-fetch and pick up the new resource.
    ///
    /// # Errors
    ///
    /// Endpoint resolution failures, HTTP errors, and transport failures
    /// are propagated unchanged.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, payload: Value) -> Result<(), RemoteDataError> {
        let endpoint = self.endpoint.href_for(&self.link_path).await?;
        let configured = self.request_service().configure(RequestDescriptor::post(
            RequestService::generate_request_id(),
            &endpoint,
            payload,
        ));
        await_write(configured.entry).await?;
        self.request_service().remove_by_href_substring(&endpoint);
        Ok(())
    }

    /// DELETE the resource with `id` under this service's endpoint.
    ///
    /// On success the orchestrator has already evicted the cached
    /// representation; listings under the endpoint are marked stale
    /// because they may still embed the deleted resource.
    ///
    /// # Errors
    ///
    /// Endpoint resolution failures, HTTP errors, and transport failures
    /// are propagated unchanged.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), RemoteDataError> {
        let endpoint = self.endpoint.href_for(&self.link_path).await?;
        let href = format!("{}/{id}", endpoint.trim_end_matches('/'));
        let configured = self.request_service().configure(RequestDescriptor::delete(
            RequestService::generate_request_id(),
            &href,
        ));
        await_write(configured.entry).await?;
        self.request_service().remove_by_href_substring(&endpoint);
        Ok(())
    }

    /// Diff two versions of the resource at `href` and send the result.
    ///
    /// Structurally equal versions send nothing.
    ///
    /// # Errors
    ///
    /// Same as [`DataService::patch`].
    pub async fn update(
        &self,
        href: &str,
        original: &Value,
        updated: &Value,
    ) -> Result<Vec<PatchOperation>, RemoteDataError> {
        let operations = diff(original, updated);
        self.patch(href, &operations).await?;
        Ok(operations)
    }

    /// Mark every tracked request whose href contains `pattern` stale.
    pub fn invalidate_by_href_substring(&self, pattern: &str) {
        self.request_service().remove_by_href_substring(pattern);
    }
}

/// Observe a configured write until it reaches a terminal state.
async fn await_write(
    mut entry_rx: watch::Receiver<RequestEntry>,
) -> Result<(), RemoteDataError> {
    loop {
        let entry = entry_rx.borrow_and_update().clone();
        match entry.state {
            RequestState::Pending => {}
            RequestState::Success { .. } => return Ok(()),
            RequestState::Error(error) => return Err(error),
        }
        if entry_rx.changed().await.is_err() {
            return Err(RemoteDataError::Transport(
                "request tracker went away".to_string(),
            ));
        }
    }
}
