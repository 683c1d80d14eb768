//! Quince CLI - Inspect HAL APIs through the cache layer.
//!
//! # Usage
//!
//! ```bash
//! # Fetch a resource and print its decoded payload
//! quince fetch https://rest.api/server/api/core/items/1
//!
//! # Fetch a paginated collection, eagerly resolving a relation
//! quince fetch --list --follow owningCollection https://rest.api/server/api/core/items
//!
//! # Resolve a link path against the API root
//! quince endpoint core/items
//!
//! # Resolve the browse href for a metadata key
//! quince browse url dc.contributor.author items
//! ```
//!
//! # Commands
//!
//! - `fetch` - Fetch a resource or collection by href
//! - `endpoint` - Resolve a link path to its href
//! - `browse url` - Resolve a browse href for a metadata key

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quince")]
#[command(author, version, about = "HAL API inspection through the quince cache layer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a resource or collection by href
    Fetch {
        /// Target href
        href: String,

        /// Decode as a paginated collection
        #[arg(long)]
        list: bool,

        /// Relation to resolve eagerly (repeatable)
        #[arg(long = "follow")]
        follow: Vec<String>,

        /// Re-issue the request when the cached copy is stale
        #[arg(long)]
        re_request_on_stale: bool,
    },
    /// Resolve a link path against the API root
    Endpoint {
        /// Slash separated link path, e.g. core/items
        link_path: String,
    },
    /// Browse index lookups
    Browse {
        #[command(subcommand)]
        action: BrowseAction,
    },
}

#[derive(Subcommand)]
enum BrowseAction {
    /// Resolve the browse href covering a metadata key
    Url {
        /// Metadata key, e.g. dc.contributor.author
        metadata_key: String,

        /// Link of the definition to resolve (`items` or `entries`)
        #[arg(default_value = "items")]
        link_path: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Fetch {
            href,
            list,
            follow,
            re_request_on_stale,
        } => {
            commands::fetch::fetch(&href, list, &follow, re_request_on_stale).await?;
        }
        Commands::Endpoint { link_path } => {
            commands::endpoint::resolve(&link_path).await?;
        }
        Commands::Browse { action } => match action {
            BrowseAction::Url {
                metadata_key,
                link_path,
            } => {
                commands::browse::url(&metadata_key, &link_path).await?;
            }
        },
    }
    Ok(())
}
