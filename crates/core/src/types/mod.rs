//! Core types for Quince.
//!
//! This module provides the HAL wire shapes and the JSON-Patch model.

pub mod identity;
pub mod link;
pub mod page;
pub mod patch;
pub mod resource;

pub use identity::ResourceIdentity;
pub use link::{Link, LinkValue, Links};
pub use page::{PageInfo, PaginatedList};
pub use patch::{PatchError, PatchOp, PatchOperation, apply_patch, escape_pointer_segment};
pub use resource::RawResource;
