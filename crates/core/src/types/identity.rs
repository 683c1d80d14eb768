//! Canonical resource identity.
//!
//! Every cached object is keyed by its `self` link. Collection endpoints
//! that have no natural `self` link use a synthetic key derived from the
//! request href, which flows through the same newtype.

use serde::{Deserialize, Serialize};

/// The canonical identity of one logical resource: its `self` href.
///
/// Never reused across different logical resources. Wrapping the string
/// prevents hrefs from being mixed up with other string-typed values
/// (relation names, metadata keys, payload fields).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    /// Create an identity from a `self` href.
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    /// The underlying href string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceIdentity {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for ResourceIdentity {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

impl From<ResourceIdentity> for String {
    fn from(identity: ResourceIdentity) -> Self {
        identity.0
    }
}
