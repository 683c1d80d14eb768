//! The assembled client: transport, cache, tracker, builder, resolver.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::cache::ObjectCache;
use crate::config::ClientConfig;
use crate::data_service::DataService;
use crate::endpoint::HalEndpointService;
use crate::registry::ServiceRegistry;
use crate::remote::RemoteDataBuildService;
use crate::request::RequestService;
use crate::services::BrowseService;
use crate::transport::{HttpTransport, Transport};

/// One fully wired client for a HAL API.
///
/// All pieces share a single object cache and request tracker, so every
/// service constructed from the same client observes the same state.
/// Cloning is cheap and shares everything.
#[derive(Clone)]
pub struct HalClient {
    config: ClientConfig,
    service: RequestService,
    builder: RemoteDataBuildService,
    endpoint: HalEndpointService,
    registry: ServiceRegistry,
}

impl HalClient {
    /// Wire a client over the `reqwest` transport.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.bearer_token.clone());
        Self::with_transport(config, Arc::new(transport))
    }

    /// Wire a client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let service = RequestService::new(transport, ObjectCache::new());
        let builder = RemoteDataBuildService::new(service.clone());
        let endpoint = HalEndpointService::new(
            service.clone(),
            config.api_root.as_str(),
            config.ms_to_live,
        );
        Self {
            config,
            service,
            builder,
            endpoint,
            registry: ServiceRegistry::new(),
        }
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared request tracker and orchestrator.
    #[must_use]
    pub const fn request_service(&self) -> &RequestService {
        &self.service
    }

    /// The remote data builder over the shared tracker.
    #[must_use]
    pub const fn builder(&self) -> &RemoteDataBuildService {
        &self.builder
    }

    /// The endpoint resolver rooted at the configured API root.
    #[must_use]
    pub const fn endpoint(&self) -> &HalEndpointService {
        &self.endpoint
    }

    /// The service registry shared by this client's consumers.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// A typed data service for the resource family at `link_path`.
    #[must_use]
    pub fn data_service<T>(&self, link_path: impl Into<String>) -> DataService<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        DataService::new(
            self.builder.clone(),
            self.endpoint.clone(),
            link_path,
            self.config.ms_to_live,
        )
    }

    /// The browse service over this client's shared state.
    #[must_use]
    pub fn browse(&self) -> BrowseService {
        BrowseService::new(
            self.builder.clone(),
            self.endpoint.clone(),
            self.config.ms_to_live,
        )
    }
}
