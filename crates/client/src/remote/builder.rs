//! Assembles observable remote data from request entries and the cache.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, instrument};

use quince_core::{PageInfo, PaginatedList, ResourceIdentity};

use crate::cache::{CachedObject, ObjectCache};
use crate::error::RemoteDataError;
use crate::remote::data::{RemoteData, RemoteDataWatch};
use crate::remote::follow_link::FollowLinkConfig;
use crate::request::{RequestDescriptor, RequestService, RequestState};

/// Builds `RemoteData` observables over the tracker and object cache.
///
/// Cloning shares the underlying service.
#[derive(Clone)]
pub struct RemoteDataBuildService {
    service: RequestService,
}

impl RemoteDataBuildService {
    /// Create a builder over a request service.
    #[must_use]
    pub const fn new(service: RequestService) -> Self {
        Self { service }
    }

    /// The underlying request service.
    #[must_use]
    pub const fn request_service(&self) -> &RequestService {
        &self.service
    }

    fn cache(&self) -> &ObjectCache {
        self.service.cache()
    }

    /// Build remote data for a single resource at `href`.
    ///
    /// Configures a GET through the orchestrator (deduplicated), then
    /// emits `RequestPending`, `ResponsePending` while declared follow
    /// links resolve, and finally `Success` with the decoded payload or
    /// `Error`.
    #[instrument(skip(self, links_to_follow))]
    pub fn build_single<T>(
        &self,
        href: &str,
        ms_to_live: u64,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
    ) -> RemoteDataWatch<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.build_with(href, ms_to_live, re_request_on_stale, links_to_follow, |_, object| {
            decode_single(object)
        })
    }

    /// Build remote data for a paginated collection at `href`.
    ///
    /// The collection's normalized embedded children are decoded in
    /// response order; page metadata comes from the collection payload's
    /// `page` object.
    #[instrument(skip(self, links_to_follow))]
    pub fn build_list<T>(
        &self,
        href: &str,
        ms_to_live: u64,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
    ) -> RemoteDataWatch<PaginatedList<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.build_with(href, ms_to_live, re_request_on_stale, links_to_follow, decode_list)
    }

    fn build_with<T, F>(
        &self,
        href: &str,
        ms_to_live: u64,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
        decode: F,
    ) -> RemoteDataWatch<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&ObjectCache, &CachedObject) -> Result<T, RemoteDataError> + Send + 'static,
    {
        let (tx, rx) = watch::channel(RemoteData::RequestPending);
        let builder = self.clone();
        let href = href.to_string();

        tokio::spawn(async move {
            builder
                .drive(href, ms_to_live, re_request_on_stale, links_to_follow, tx, decode)
                .await;
        });

        RemoteDataWatch::new(rx)
    }

    async fn drive<T, F>(
        &self,
        href: String,
        ms_to_live: u64,
        re_request_on_stale: bool,
        links_to_follow: Vec<FollowLinkConfig>,
        tx: watch::Sender<RemoteData<T>>,
        decode: F,
    ) where
        T: Clone + Send + Sync + 'static,
        F: Fn(&ObjectCache, &CachedObject) -> Result<T, RemoteDataError> + Send + 'static,
    {
        let configured = self.service.configure(RequestDescriptor::get(
            RequestService::generate_request_id(),
            &href,
            ms_to_live,
            re_request_on_stale,
        ));
        let mut entry_rx = configured.entry;

        loop {
            let entry = entry_rx.borrow_and_update().clone();
            match entry.state {
                RequestState::Pending => {
                    // Initial watch value is already RequestPending; this
                    // is a no-op re-send on spurious wakeups.
                    let _ = tx.send_replace(RemoteData::RequestPending);
                }
                RequestState::Error(error) => {
                    let time = entry.response_timestamp.unwrap_or_else(Utc::now);
                    let _ = tx.send_replace(RemoteData::from_error(&error, time));
                    return;
                }
                RequestState::Success { ref identity, .. } => {
                    let now = Utc::now();
                    let is_stale = entry.is_stale(now);
                    let time_completed = entry.response_timestamp.unwrap_or(now);

                    let Some(identity) = identity else {
                        let _ = tx.send_replace(RemoteData::from_error(
                            &RemoteDataError::Decode(
                                "response carried no decodable resource".to_string(),
                            ),
                            time_completed,
                        ));
                        return;
                    };
                    let Some(object) = self.cache().get(identity) else {
                        let _ = tx.send_replace(RemoteData::from_error(
                            &RemoteDataError::Decode(format!(
                                "no cached object for {identity}"
                            )),
                            time_completed,
                        ));
                        return;
                    };

                    if !links_to_follow.is_empty() {
                        let _ = tx.send_replace(RemoteData::ResponsePending);
                        if let Err(error) = self
                            .resolve_links(&object, &links_to_follow, ms_to_live, re_request_on_stale)
                            .await
                        {
                            let _ = tx.send_replace(RemoteData::from_error(&error, Utc::now()));
                            return;
                        }
                    }

                    let state = match decode(self.cache(), &object) {
                        Ok(payload) => RemoteData::Success {
                            payload,
                            time_completed,
                            is_stale,
                        },
                        Err(error) => RemoteData::from_error(&error, time_completed),
                    };
                    let _ = tx.send_replace(state);
                    return;
                }
            }

            if entry_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Recursively resolve the declared follow links of `object`.
    ///
    /// Each relation is resolved from the cache when a fresh
    /// representation is already there (embedded children land in the
    /// cache during normalization), and through the orchestrator
    /// otherwise. Because the orchestrator deduplicates by href, a cyclic
    /// hypermedia graph never causes more than one request per unique
    /// href; recursion depth is bounded by the finite config tree.
    fn resolve_links<'a>(
        &'a self,
        object: &'a CachedObject,
        configs: &'a [FollowLinkConfig],
        ms_to_live: u64,
        re_request_on_stale: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), RemoteDataError>> + Send + 'a>> {
        Box::pin(async move {
            for config in configs {
                // Normalized embedded children first: already cached.
                if let Some(identities) = object.embedded.get(&config.relation) {
                    for identity in identities {
                        if let Some(child) = self.cache().get(identity) {
                            self.resolve_links(
                                &child,
                                &config.links_to_follow,
                                ms_to_live,
                                re_request_on_stale,
                            )
                            .await?;
                        }
                    }
                    continue;
                }

                let Some(link_href) = object.links.href(&config.relation) else {
                    debug!(relation = %config.relation, "Relation not present, skipping");
                    continue;
                };

                // A fresh cached representation short-circuits the fetch.
                let target = ResourceIdentity::from(link_href);
                if let Some(child) = self.cache().get(&target)
                    && !(re_request_on_stale && child.is_stale(Utc::now()))
                {
                    self.resolve_links(
                        &child,
                        &config.links_to_follow,
                        ms_to_live,
                        re_request_on_stale,
                    )
                    .await?;
                    continue;
                }

                let configured = self.service.configure(RequestDescriptor::get(
                    RequestService::generate_request_id(),
                    link_href,
                    ms_to_live,
                    re_request_on_stale,
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
                    RequestState::Success {
                        identity: Some(identity),
                        ..
                    } => {
                        if let Some(child) = self.cache().get(&identity) {
                            self.resolve_links(
                                &child,
                                &config.links_to_follow,
                                ms_to_live,
                                re_request_on_stale,
                            )
                            .await?;
                        }
                    }
                    RequestState::Success { identity: None, .. } => {}
                    RequestState::Error(error) => return Err(error),
                    RequestState::Pending => unreachable!("loop exits on terminal states only"),
                }
            }
            Ok(())
        })
    }
}

fn decode_single<T: DeserializeOwned>(object: &CachedObject) -> Result<T, RemoteDataError> {
    serde_json::from_value(object.decodable_value())
        .map_err(|e| RemoteDataError::Decode(e.to_string()))
}

fn decode_list<T: DeserializeOwned>(
    cache: &ObjectCache,
    object: &CachedObject,
) -> Result<PaginatedList<T>, RemoteDataError> {
    let mut items = Vec::new();
    for identities in object.embedded.values() {
        for identity in identities {
            let child = cache.get(identity).ok_or_else(|| {
                RemoteDataError::Decode(format!("no cached object for {identity}"))
            })?;
            items.push(decode_single(&child)?);
        }
    }

    let page_info = object
        .payload
        .get("page")
        .cloned()
        .and_then(|page| serde_json::from_value::<PageInfo>(page).ok())
        .unwrap_or(PageInfo {
            size: u32::try_from(items.len()).unwrap_or(u32::MAX),
            total_elements: items.len() as u64,
            total_pages: 1,
            current_page: 0,
        });

    Ok(PaginatedList::new(page_info, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Widget {
        name: String,
    }

    fn builder_with(mock: &MockTransport) -> RemoteDataBuildService {
        RemoteDataBuildService::new(RequestService::new(
            Arc::new(mock.clone()),
            ObjectCache::new(),
        ))
    }

    #[tokio::test]
    async fn test_build_single_decodes_payload() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets/1",
            json!({
                "name": "sprocket",
                "_links": { "self": { "href": "https://rest.api/widgets/1" } }
            }),
        );
        let builder = builder_with(&mock);

        let mut watch =
            builder.build_single::<Widget>("https://rest.api/widgets/1", 60_000, true, vec![]);
        let terminal = watch.wait_for_terminal().await;

        assert_eq!(
            terminal.payload(),
            Some(&Widget {
                name: "sprocket".to_string()
            })
        );
        assert!(!terminal.is_stale());
    }

    #[tokio::test]
    async fn test_build_single_surfaces_http_error() {
        let mock = MockTransport::new();
        // Nothing registered: the mock answers 404
        let builder = builder_with(&mock);

        let mut watch =
            builder.build_single::<Widget>("https://rest.api/widgets/404", 60_000, true, vec![]);
        let terminal = watch.wait_for_terminal().await;

        match terminal {
            RemoteData::Error { status_code, .. } => assert_eq!(status_code, Some(404)),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_list_decodes_embedded_children() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets",
            json!({
                "page": { "size": 20, "totalElements": 2, "totalPages": 1, "number": 0 },
                "_links": { "self": { "href": "https://rest.api/widgets" } },
                "_embedded": {
                    "widgets": [
                        { "name": "a", "_links": { "self": { "href": "https://rest.api/widgets/a" } } },
                        { "name": "b", "_links": { "self": { "href": "https://rest.api/widgets/b" } } }
                    ]
                }
            }),
        );
        let builder = builder_with(&mock);

        let mut watch =
            builder.build_list::<Widget>("https://rest.api/widgets", 60_000, true, vec![]);
        let terminal = watch.wait_for_terminal().await;

        let list = terminal.into_payload().expect("success");
        assert_eq!(list.page_info.total_elements, 2);
        assert_eq!(
            list.items.iter().map(|w| w.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_follow_link_fetches_relation() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets/1",
            json!({
                "name": "sprocket",
                "_links": {
                    "self": { "href": "https://rest.api/widgets/1" },
                    "owner": { "href": "https://rest.api/users/9" }
                }
            }),
        );
        mock.on_get(
            "https://rest.api/users/9",
            json!({
                "name": "dana",
                "_links": { "self": { "href": "https://rest.api/users/9" } }
            }),
        );
        let builder = builder_with(&mock);

        let mut watch = builder.build_single::<Widget>(
            "https://rest.api/widgets/1",
            60_000,
            true,
            vec![FollowLinkConfig::new("owner")],
        );
        let terminal = watch.wait_for_terminal().await;

        assert!(terminal.is_success());
        // The followed relation is now resolved into the shared cache
        assert!(
            builder
                .request_service()
                .cache()
                .has_by_self_link("https://rest.api/users/9")
        );
        assert_eq!(mock.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_follow_link_error_fails_parent() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets/1",
            json!({
                "name": "sprocket",
                "_links": {
                    "self": { "href": "https://rest.api/widgets/1" },
                    "owner": { "href": "https://rest.api/users/missing" }
                }
            }),
        );
        let builder = builder_with(&mock);

        let mut watch = builder.build_single::<Widget>(
            "https://rest.api/widgets/1",
            60_000,
            true,
            vec![FollowLinkConfig::new("owner")],
        );
        let terminal = watch.wait_for_terminal().await;

        match terminal {
            RemoteData::Error { status_code, .. } => assert_eq!(status_code, Some(404)),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cyclic_follow_links_fetch_each_href_once() {
        let mock = MockTransport::new();
        // collection -> items (embedded) -> each item links back to the
        // collection; the nested plan walks the cycle.
        mock.on_get(
            "https://rest.api/collections/1",
            json!({
                "name": "c",
                "_links": {
                    "self": { "href": "https://rest.api/collections/1" },
                    "items": { "href": "https://rest.api/collections/1/items" }
                }
            }),
        );
        mock.on_get(
            "https://rest.api/collections/1/items",
            json!({
                "page": { "size": 1, "totalElements": 1, "totalPages": 1, "number": 0 },
                "_links": { "self": { "href": "https://rest.api/collections/1/items" } },
                "_embedded": {
                    "items": [
                        {
                            "name": "i",
                            "_links": {
                                "self": { "href": "https://rest.api/items/i" },
                                "owningCollection": { "href": "https://rest.api/collections/1" }
                            }
                        }
                    ]
                }
            }),
        );
        let builder = builder_with(&mock);

        let plan = FollowLinkConfig::new("items")
            .then(FollowLinkConfig::new("items").then(FollowLinkConfig::new("owningCollection")));
        let mut watch = builder.build_single::<serde_json::Value>(
            "https://rest.api/collections/1",
            60_000,
            true,
            vec![plan],
        );
        let terminal = watch.wait_for_terminal().await;

        assert!(terminal.is_success());
        assert_eq!(
            mock.calls_for(
                crate::request::RequestMethod::Get,
                "https://rest.api/collections/1"
            ),
            1
        );
        assert_eq!(
            mock.calls_for(
                crate::request::RequestMethod::Get,
                "https://rest.api/collections/1/items"
            ),
            1
        );
        assert_eq!(mock.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_without_re_request_serves_stale_payload() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets/1",
            json!({
                "name": "sprocket",
                "_links": { "self": { "href": "https://rest.api/widgets/1" } }
            }),
        );
        let builder = builder_with(&mock);

        // TTL zero: stale immediately
        let mut first =
            builder.build_single::<Widget>("https://rest.api/widgets/1", 0, false, vec![]);
        first.wait_for_terminal().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut second =
            builder.build_single::<Widget>("https://rest.api/widgets/1", 0, false, vec![]);
        let terminal = second.wait_for_terminal().await;

        assert!(terminal.is_success());
        assert!(terminal.is_stale());
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_with_re_request_reissues_once() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://rest.api/widgets/1",
            json!({
                "name": "sprocket",
                "_links": { "self": { "href": "https://rest.api/widgets/1" } }
            }),
        );
        let builder = builder_with(&mock);

        let mut first =
            builder.build_single::<Widget>("https://rest.api/widgets/1", 0, true, vec![]);
        first.wait_for_terminal().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut second =
            builder.build_single::<Widget>("https://rest.api/widgets/1", 0, true, vec![]);
        let terminal = second.wait_for_terminal().await;

        assert!(terminal.is_success());
        assert_eq!(mock.total_calls(), 2);
    }
}
