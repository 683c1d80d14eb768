//! Raw HAL resource envelope.
//!
//! The shape every fetched document is first parsed into, before any
//! domain-specific decoding: a payload of arbitrary fields plus the HAL
//! `_links` and `_embedded` reserved members.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::identity::ResourceIdentity;
use crate::types::link::Links;

/// A fetched HAL document, split into payload and hypermedia members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResource {
    /// The `_links` object. Every well-formed resource carries `self`.
    #[serde(rename = "_links", default)]
    pub links: Links,

    /// The `_embedded` object: relation name to embedded document(s).
    #[serde(rename = "_embedded", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub embedded: BTreeMap<String, Value>,

    /// Everything else: the domain payload fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RawResource {
    /// The canonical identity (`self` href) of this resource.
    #[must_use]
    pub fn identity(&self) -> Option<ResourceIdentity> {
        self.links.self_href().map(ResourceIdentity::from)
    }

    /// The payload as a JSON object value, without hypermedia members.
    #[must_use]
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}
