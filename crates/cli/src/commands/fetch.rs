//! Fetch a resource or collection and print its decoded payload.

use quince_client::{FollowLinkConfig, RemoteData};
use serde_json::Value;

use super::{CommandError, client_from_env};

/// Fetch `href` through the cache layer and print the payload as JSON.
pub async fn fetch(
    href: &str,
    list: bool,
    follow: &[String],
    re_request_on_stale: bool,
) -> Result<(), CommandError> {
    let client = client_from_env()?;
    let ms_to_live = client.config().ms_to_live;
    let links_to_follow: Vec<FollowLinkConfig> =
        follow.iter().map(FollowLinkConfig::new).collect();

    let payload = if list {
        let mut watch = client.builder().build_list::<Value>(
            href,
            ms_to_live,
            re_request_on_stale,
            links_to_follow,
        );
        let terminal = watch.wait_for_terminal().await;
        report_staleness(&terminal);
        let page = terminal.into_result()?;
        serde_json::json!({
            "page": {
                "size": page.page_info.size,
                "totalElements": page.page_info.total_elements,
                "totalPages": page.page_info.total_pages,
                "number": page.page_info.current_page,
            },
            "items": page.items,
        })
    } else {
        let mut watch = client.builder().build_single::<Value>(
            href,
            ms_to_live,
            re_request_on_stale,
            links_to_follow,
        );
        let terminal = watch.wait_for_terminal().await;
        report_staleness(&terminal);
        terminal.into_result()?
    };

    print_json(&payload)?;
    Ok(())
}

fn report_staleness<T>(state: &RemoteData<T>) {
    if state.is_stale() {
        tracing::warn!("Serving a stale cached copy; pass --re-request-on-stale to refresh");
    }
}

#[allow(clippy::print_stdout)]
fn print_json(payload: &Value) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(payload)
        .map_err(|e| CommandError::Fetch(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
