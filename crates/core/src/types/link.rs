//! HAL link shapes.
//!
//! A HAL resource advertises relations in its `_links` object. Each
//! relation maps to either a single link object or an array of them, so
//! deserialization has to accept both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One link object: `{ "href": "..." }`.
///
/// HAL allows extra attributes (`templated`, `title`, ...); only the ones
/// the cache layer consumes are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL of the relation.
    pub href: String,
    /// Whether the href is an RFC 6570 template.
    #[serde(default, skip_serializing_if = "is_false")]
    pub templated: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Link {
    /// Create a plain (non-templated) link.
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
        }
    }
}

/// The value of one relation in `_links`: a single link or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
    /// A single link object.
    Single(Link),
    /// An array of link objects (e.g. `curies`, multi-valued relations).
    Many(Vec<Link>),
}

impl LinkValue {
    /// The first href of the relation, whatever its arity.
    #[must_use]
    pub fn first_href(&self) -> Option<&str> {
        match self {
            Self::Single(link) => Some(&link.href),
            Self::Many(links) => links.first().map(|link| link.href.as_str()),
        }
    }

    /// All hrefs of the relation.
    #[must_use]
    pub fn hrefs(&self) -> Vec<&str> {
        match self {
            Self::Single(link) => vec![&link.href],
            Self::Many(links) => links.iter().map(|link| link.href.as_str()).collect(),
        }
    }
}

/// The `_links` object of a HAL resource: relation name to link value.
///
/// A `BTreeMap` keeps serialization order deterministic, which matters for
/// cache payload comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(pub BTreeMap<String, LinkValue>);

impl Links {
    /// Empty link set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a relation's first href by name.
    #[must_use]
    pub fn href(&self, relation: &str) -> Option<&str> {
        self.0.get(relation).and_then(LinkValue::first_href)
    }

    /// The resource's `self` href, if present.
    #[must_use]
    pub fn self_href(&self) -> Option<&str> {
        self.href("self")
    }

    /// Insert a single-valued relation.
    pub fn insert(&mut self, relation: impl Into<String>, href: impl Into<String>) {
        self.0
            .insert(relation.into(), LinkValue::Single(Link::new(href)));
    }

    /// Whether the relation exists at all.
    #[must_use]
    pub fn contains(&self, relation: &str) -> bool {
        self.0.contains_key(relation)
    }

    /// Iterate over (relation, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LinkValue)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_deserialize_single_and_many() {
        let json = serde_json::json!({
            "self": { "href": "https://rest.api/browses/author" },
            "items": { "href": "https://rest.api/browses/author/items" },
            "curies": [
                { "href": "https://rest.api/docs/{rel}", "templated": true }
            ]
        });

        let links: Links = serde_json::from_value(json).expect("valid links");
        assert_eq!(links.self_href(), Some("https://rest.api/browses/author"));
        assert_eq!(
            links.href("items"),
            Some("https://rest.api/browses/author/items")
        );
        assert_eq!(
            links.href("curies"),
            Some("https://rest.api/docs/{rel}")
        );
        assert!(!links.contains("entries"));
    }

    #[test]
    fn test_link_value_hrefs() {
        let many = LinkValue::Many(vec![Link::new("a"), Link::new("b")]);
        assert_eq!(many.hrefs(), vec!["a", "b"]);
        assert_eq!(many.first_href(), Some("a"));

        let single = LinkValue::Single(Link::new("c"));
        assert_eq!(single.hrefs(), vec!["c"]);
    }

    #[test]
    fn test_templated_flag_skipped_when_false() {
        let json = serde_json::to_value(Link::new("https://rest.api/x")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "href": "https://rest.api/x" }));
    }
}
