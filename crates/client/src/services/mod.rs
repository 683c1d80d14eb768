//! Feature services layered on the typed data services.

mod browse;

pub use browse::{BrowseDefinition, BrowseService};
