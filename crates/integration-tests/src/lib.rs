//! Integration tests for quince.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p quince-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `request_deduplication` - Fan-in, staleness, and invalidation
//! - `remote_data_lifecycle` - State ordering and follow-link resolution
//! - `patch_round_trip` - Diffing, accumulation, and flushing
//! - `browse_lookup` - Endpoint discovery and browse href resolution
//!
//! All tests run against the in-process mock transport; no network or
//! server is required.

use std::sync::Arc;

use quince_client::transport::mock::MockTransport;
use quince_client::{ClientConfig, HalClient};

/// The API root every test wires its client against.
pub const API_ROOT: &str = "https://rest.api/server/api";

/// A fully wired client over a fresh mock transport.
///
/// # Panics
///
/// Panics when the constant API root fails URL validation, which would
/// be a bug in the test harness itself.
#[must_use]
pub fn test_client(mock: &MockTransport) -> HalClient {
    let config = ClientConfig::for_api_root(API_ROOT).expect("valid test api root");
    HalClient::with_transport(config, Arc::new(mock.clone()))
}
