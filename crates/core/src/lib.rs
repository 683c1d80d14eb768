//! Quince Core - Shared HAL types library.
//!
//! This crate provides the common types used across all Quince components:
//! - `client` - The remote data cache and request orchestration layer
//! - `cli` - Command-line tool for fetching and inspecting HAL resources
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! channels. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - HAL links, resource identity, raw resource envelopes,
//!   paginated lists, and JSON-Patch operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
