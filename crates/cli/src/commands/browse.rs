//! Browse index lookups.

use super::{CommandError, client_from_env};

/// Print the browse href covering `metadata_key`.
#[allow(clippy::print_stdout)]
pub async fn url(metadata_key: &str, link_path: &str) -> Result<(), CommandError> {
    let client = client_from_env()?;
    let href = client
        .browse()
        .get_browse_url_for(metadata_key, link_path)
        .await?;
    println!("{href}");
    Ok(())
}
