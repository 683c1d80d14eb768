//! Normalized object cache.
//!
//! Raw resource representations are stored once, keyed by canonical
//! identity (their `self` link). Everything derived - `RemoteData`,
//! decoded models, paginated lists - is recomputed from here.

mod object_cache;

pub use object_cache::{CachedObject, ObjectCache};
