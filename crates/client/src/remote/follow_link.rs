//! Declarative follow-link resolution plans.

/// A declarative tree describing which relations of a resource must be
/// eagerly resolved into their own remote data before the parent counts
/// as resolved.
///
/// Owns no data; it is a resolution plan only. Because the tree is
/// finite, resolution depth is bounded even when the hypermedia graph
/// itself is cyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowLinkConfig {
    /// The relation name to resolve (a key of the resource's `_links`).
    pub relation: String,
    /// Plans for the resolved resource's own relations.
    pub links_to_follow: Vec<FollowLinkConfig>,
}

impl FollowLinkConfig {
    /// A leaf plan: resolve `relation`, follow nothing further.
    #[must_use]
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            links_to_follow: Vec::new(),
        }
    }

    /// Add a nested plan for the resolved resource.
    #[must_use]
    pub fn then(mut self, child: Self) -> Self {
        self.links_to_follow.push(child);
        self
    }
}

/// Shorthand for [`FollowLinkConfig::new`].
#[must_use]
pub fn follow_link(relation: impl Into<String>) -> FollowLinkConfig {
    FollowLinkConfig::new(relation)
}
