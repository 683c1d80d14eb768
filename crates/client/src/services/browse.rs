//! Browse index lookups.
//!
//! The server advertises its configured browse indexes (by title, by
//! author, by date, ...) as a collection of definitions. Each definition
//! names the metadata keys it covers, possibly with wildcards, and
//! carries the links browsing goes through. Nothing here assembles
//! browse hrefs by hand.

use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use quince_core::{Links, PaginatedList};

use crate::data_service::{DataService, FindListOptions};
use crate::endpoint::HalEndpointService;
use crate::error::RemoteDataError;
use crate::remote::{RemoteDataBuildService, RemoteDataWatch};

const BROWSE_LINK_PATH: &str = "discover/browses";

/// One configured browse index.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BrowseDefinition {
    /// Index identifier, e.g. `author` or `title`.
    pub id: String,
    /// Metadata keys this index covers. A key may end in `.*` to cover
    /// every key under that prefix.
    #[serde(rename = "metadataKeys", default)]
    pub metadata_keys: Vec<String>,
    /// Links of the definition, including `items` and `entries`.
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl BrowseDefinition {
    /// Whether this index covers `metadata_key`, honoring wildcards.
    #[must_use]
    pub fn covers(&self, metadata_key: &str) -> bool {
        self.metadata_keys
            .iter()
            .any(|stored| key_matches(stored, metadata_key))
    }
}

/// Wildcard-aware metadata key matching: `dc.contributor.*` covers
/// `dc.contributor.author`.
fn key_matches(stored: &str, queried: &str) -> bool {
    stored.strip_suffix(".*").map_or(stored == queried, |prefix| {
        queried
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Looks up browse definitions and the hrefs browsing goes through.
///
/// Cloning shares the underlying services and cache.
#[derive(Clone)]
pub struct BrowseService {
    builder: RemoteDataBuildService,
    definitions: DataService<BrowseDefinition>,
    ms_to_live: u64,
}

impl BrowseService {
    /// Create a browse service over the shared builder and resolver.
    #[must_use]
    pub fn new(
        builder: RemoteDataBuildService,
        endpoint: HalEndpointService,
        ms_to_live: u64,
    ) -> Self {
        let definitions = DataService::new(
            builder.clone(),
            endpoint,
            BROWSE_LINK_PATH,
            ms_to_live,
        );
        Self {
            builder,
            definitions,
            ms_to_live,
        }
    }

    /// Fetch the configured browse definitions.
    ///
    /// # Errors
    ///
    /// Endpoint resolution failures are returned before the fetch starts.
    pub async fn get_browse_definitions(
        &self,
        re_request_on_stale: bool,
    ) -> Result<RemoteDataWatch<PaginatedList<BrowseDefinition>>, RemoteDataError> {
        self.definitions
            .find_all(&FindListOptions::default(), re_request_on_stale, vec![])
            .await
    }

    /// Resolve the href of `link_path` (`items` or `entries`) on the
    /// browse index covering `metadata_key`.
    ///
    /// # Errors
    ///
    /// [`RemoteDataError::NotConfigured`] when no definition covers the
    /// key or the covering definition lacks the link.
    #[instrument(skip(self))]
    pub async fn get_browse_url_for(
        &self,
        metadata_key: &str,
        link_path: &str,
    ) -> Result<String, RemoteDataError> {
        let mut watch = self.get_browse_definitions(false).await?;
        let definitions = watch
            .wait_for_terminal()
            .await
            .into_result()
            .map(|list| list.items)?;

        definitions
            .iter()
            .find(|definition| definition.covers(metadata_key))
            .and_then(|definition| definition.links.href(link_path))
            .map(ToString::to_string)
            .ok_or_else(|| {
                RemoteDataError::NotConfigured(format!(
                    "A browse endpoint for {link_path} on {metadata_key} isn't configured"
                ))
            })
    }

    /// Fetch the value entries of a browse index.
    ///
    /// # Errors
    ///
    /// [`RemoteDataError::NotConfigured`] when the definition has no
    /// `entries` link or `options` produce an invalid href.
    pub fn get_browse_entries_for(
        &self,
        definition: &BrowseDefinition,
        options: &FindListOptions,
        re_request_on_stale: bool,
    ) -> Result<RemoteDataWatch<PaginatedList<Value>>, RemoteDataError> {
        self.list_at(definition, "entries", options, re_request_on_stale)
    }

    /// Fetch the items of a browse index, optionally filtered to one
    /// entry value via `filterValue`.
    ///
    /// # Errors
    ///
    /// [`RemoteDataError::NotConfigured`] when the definition has no
    /// `items` link or `options` produce an invalid href.
    pub fn get_browse_items_for(
        &self,
        definition: &BrowseDefinition,
        filter_value: Option<&str>,
        options: &FindListOptions,
        re_request_on_stale: bool,
    ) -> Result<RemoteDataWatch<PaginatedList<Value>>, RemoteDataError> {
        let mut options = options.clone();
        if let Some(value) = filter_value {
            options
                .search_params
                .push(("filterValue".to_string(), value.to_string()));
        }
        self.list_at(definition, "items", &options, re_request_on_stale)
    }

    /// Fetch the first item of a browse index: page 0, size 1.
    ///
    /// # Errors
    ///
    /// Same as [`BrowseService::get_browse_items_for`].
    pub fn get_first_item_for(
        &self,
        definition: &BrowseDefinition,
        re_request_on_stale: bool,
    ) -> Result<RemoteDataWatch<PaginatedList<Value>>, RemoteDataError> {
        let options = FindListOptions {
            page: Some(0),
            size: Some(1),
            ..FindListOptions::default()
        };
        self.get_browse_items_for(definition, None, &options, re_request_on_stale)
    }

    fn list_at(
        &self,
        definition: &BrowseDefinition,
        relation: &str,
        options: &FindListOptions,
        re_request_on_stale: bool,
    ) -> Result<RemoteDataWatch<PaginatedList<Value>>, RemoteDataError> {
        let href = definition.links.href(relation).ok_or_else(|| {
            RemoteDataError::NotConfigured(format!(
                "Browse definition {} has no '{relation}' link",
                definition.id
            ))
        })?;
        let href = options.apply_to(href)?;
        Ok(self
            .builder
            .build_list(&href, self.ms_to_live, re_request_on_stale, vec![]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::request::RequestService;
    use crate::transport::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn browse_with(mock: &MockTransport) -> BrowseService {
        let service = RequestService::new(Arc::new(mock.clone()), ObjectCache::new());
        let endpoint = HalEndpointService::new(
            service.clone(),
            "https://rest.api/server/api",
            60_000,
        );
        BrowseService::new(RemoteDataBuildService::new(service), endpoint, 60_000)
    }

    fn seed_definitions(mock: &MockTransport) {
        mock.on_get(
            "https://rest.api/server/api",
            json!({
                "_links": {
                    "self": { "href": "https://rest.api/server/api" },
                    "discover": { "href": "https://rest.api/server/api/discover" }
                }
            }),
        );
        mock.on_get(
            "https://rest.api/server/api/discover",
            json!({
                "_links": {
                    "self": { "href": "https://rest.api/server/api/discover" },
                    "browses": { "href": "https://rest.api/server/api/discover/browses" }
                }
            }),
        );
        mock.on_get(
            "https://rest.api/server/api/discover/browses",
            json!({
                "page": { "size": 20, "totalElements": 2, "totalPages": 1, "number": 0 },
                "_links": { "self": { "href": "https://rest.api/server/api/discover/browses" } },
                "_embedded": {
                    "browses": [
                        {
                            "id": "author",
                            "metadataKeys": ["dc.contributor.*", "dc.creator"],
                            "_links": {
                                "self": { "href": "https://rest.api/server/api/discover/browses/author" },
                                "items": { "href": "https://rest.api/server/api/discover/browses/author/items" },
                                "entries": { "href": "https://rest.api/server/api/discover/browses/author/entries" }
                            }
                        },
                        {
                            "id": "title",
                            "metadataKeys": ["dc.title"],
                            "_links": {
                                "self": { "href": "https://rest.api/server/api/discover/browses/title" },
                                "items": { "href": "https://rest.api/server/api/discover/browses/title/items" }
                            }
                        }
                    ]
                }
            }),
        );
    }

    #[test]
    fn test_key_matching_honors_wildcards() {
        assert!(key_matches("dc.title", "dc.title"));
        assert!(key_matches("dc.contributor.*", "dc.contributor.author"));
        assert!(!key_matches("dc.contributor.*", "dc.contributor"));
        assert!(!key_matches("dc.contributor.*", "dc.contributors.author"));
        assert!(!key_matches("dc.title", "dc.title.alternative"));
    }

    #[tokio::test]
    async fn test_browse_url_for_exact_key() {
        let mock = MockTransport::new();
        seed_definitions(&mock);
        let browse = browse_with(&mock);

        let href = browse
            .get_browse_url_for("dc.title", "items")
            .await
            .expect("configured");
        assert_eq!(
            href,
            "https://rest.api/server/api/discover/browses/title/items"
        );
    }

    #[tokio::test]
    async fn test_browse_url_for_wildcard_key() {
        let mock = MockTransport::new();
        seed_definitions(&mock);
        let browse = browse_with(&mock);

        let href = browse
            .get_browse_url_for("dc.contributor.author", "items")
            .await
            .expect("wildcard covers");
        assert_eq!(
            href,
            "https://rest.api/server/api/discover/browses/author/items"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_pair_yields_error() {
        let mock = MockTransport::new();
        seed_definitions(&mock);
        let browse = browse_with(&mock);

        let error = browse
            .get_browse_url_for("dc.title", "entries")
            .await
            .expect_err("title index has no entries link");
        assert_eq!(
            error,
            RemoteDataError::NotConfigured(
                "A browse endpoint for entries on dc.title isn't configured".to_string()
            )
        );

        let error = browse
            .get_browse_url_for("dc.subject", "items")
            .await
            .expect_err("no index covers the key");
        assert_eq!(
            error,
            RemoteDataError::NotConfigured(
                "A browse endpoint for items on dc.subject isn't configured".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_items_for_applies_filter_value() {
        let mock = MockTransport::new();
        seed_definitions(&mock);
        mock.on_get(
            "https://rest.api/server/api/discover/browses/author/items?filterValue=Smith",
            json!({
                "page": { "size": 20, "totalElements": 1, "totalPages": 1, "number": 0 },
                "_links": { "self": { "href": "https://rest.api/server/api/discover/browses/author/items?filterValue=Smith" } },
                "_embedded": {
                    "items": [
                        { "name": "paper", "_links": { "self": { "href": "https://rest.api/server/api/core/items/1" } } }
                    ]
                }
            }),
        );
        let browse = browse_with(&mock);

        let mut watch = browse.get_browse_definitions(false).await.expect("resolves");
        let definitions = watch
            .wait_for_terminal()
            .await
            .into_payload()
            .expect("ok")
            .items;
        let author = definitions.iter().find(|d| d.id == "author").expect("author");

        let mut items = browse
            .get_browse_items_for(author, Some("Smith"), &FindListOptions::default(), false)
            .expect("items link");
        let list = items.wait_for_terminal().await.into_payload().expect("ok");
        assert_eq!(list.page_info.total_elements, 1);
    }

    #[tokio::test]
    async fn test_first_item_requests_single_element_page() {
        let mock = MockTransport::new();
        seed_definitions(&mock);
        mock.on_get(
            "https://rest.api/server/api/discover/browses/author/items?page=0&size=1",
            json!({
                "page": { "size": 1, "totalElements": 5, "totalPages": 5, "number": 0 },
                "_links": { "self": { "href": "https://rest.api/server/api/discover/browses/author/items?page=0&size=1" } },
                "_embedded": {
                    "items": [
                        { "name": "first", "_links": { "self": { "href": "https://rest.api/server/api/core/items/9" } } }
                    ]
                }
            }),
        );
        let browse = browse_with(&mock);

        let mut watch = browse.get_browse_definitions(false).await.expect("resolves");
        let definitions = watch
            .wait_for_terminal()
            .await
            .into_payload()
            .expect("ok")
            .items;
        let author = definitions.iter().find(|d| d.id == "author").expect("author");

        let mut items = browse.get_first_item_for(author, false).expect("items link");
        let list = items.wait_for_terminal().await.into_payload().expect("ok");
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.page_info.total_pages, 5);
    }
}
