//! Quince client library.
//!
//! A client-side cache and request orchestration layer for HAL APIs:
//! responses are normalized into an object cache keyed by self link,
//! concurrent identical requests share one network call, and consumers
//! observe results through the `RemoteData` lifecycle instead of raw
//! responses. Partial updates travel as JSON-Patch batches produced by
//! structural diffing.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod client;
pub mod config;
pub mod data_service;
pub mod endpoint;
pub mod error;
pub mod patch;
pub mod registry;
pub mod remote;
pub mod request;
pub mod services;
pub mod transport;

pub use client::HalClient;
pub use config::ClientConfig;
pub use error::RemoteDataError;
pub use remote::{FollowLinkConfig, RemoteData, RemoteDataWatch, follow_link};
