//! Remote data: the derived, observable lifecycle wrapper around a
//! request and its cached payload.

mod builder;
mod data;
mod follow_link;

pub use builder::RemoteDataBuildService;
pub use data::{RemoteData, RemoteDataWatch};
pub use follow_link::{FollowLinkConfig, follow_link};
