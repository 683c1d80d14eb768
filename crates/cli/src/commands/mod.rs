//! CLI command implementations.

pub mod browse;
pub mod endpoint;
pub mod fetch;

use quince_client::{ClientConfig, HalClient};
use thiserror::Error;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] quince_client::error::ConfigError),

    /// The remote data layer reported a failure.
    #[error(transparent)]
    Remote(#[from] quince_client::RemoteDataError),

    /// The fetched state ended in an error or never became terminal.
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// A client wired from the environment.
pub fn client_from_env() -> Result<HalClient, CommandError> {
    let config = ClientConfig::from_env()?;
    Ok(HalClient::new(config))
}
