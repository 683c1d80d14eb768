//! Resolve a link path against the API root.

use super::{CommandError, client_from_env};

/// Print the href `link_path` resolves to.
#[allow(clippy::print_stdout)]
pub async fn resolve(link_path: &str) -> Result<(), CommandError> {
    let client = client_from_env()?;
    let href = client.endpoint().href_for(link_path).await?;
    println!("{href}");
    Ok(())
}
