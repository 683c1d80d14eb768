//! The process-wide store of raw resource representations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use quince_core::{Links, ResourceIdentity};

/// One cached raw resource.
///
/// Owned exclusively by the [`ObjectCache`]; mutated only via `put` (full
/// replace) or `remove` (eviction). At most one per identity at any time.
#[derive(Debug, Clone)]
pub struct CachedObject {
    /// Canonical identity (`self` href, or a synthetic key for
    /// collection endpoints without one).
    pub identity: ResourceIdentity,
    /// The domain payload, without HAL reserved members.
    pub payload: Value,
    /// The resource's `_links`.
    pub links: Links,
    /// Identities of normalized `_embedded` children, by relation.
    pub embedded: BTreeMap<String, Vec<ResourceIdentity>>,
    /// When this representation was stored.
    pub last_updated: DateTime<Utc>,
    /// Milliseconds before the representation counts as stale.
    pub ms_to_live: u64,
}

impl CachedObject {
    /// Staleness check: `now - last_updated > ms_to_live`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.last_updated);
        age.num_milliseconds() >= 0 && age.num_milliseconds() as u64 > self.ms_to_live
    }

    /// The payload with `_links` re-attached, ready for model decoding.
    #[must_use]
    pub fn decodable_value(&self) -> Value {
        let mut value = self.payload.clone();
        if let Value::Object(map) = &mut value
            && let Ok(links) = serde_json::to_value(&self.links)
        {
            map.insert("_links".to_string(), links);
        }
        value
    }
}

/// Normalized store of raw resources, keyed by canonical identity.
///
/// Cloning is cheap; all clones share one store. Reads never block on
/// network activity - absence is a valid outcome that triggers a fetch
/// upstream. Every `put`/`remove` bumps a per-identity watch channel so
/// derived remote data can recompute reactively.
#[derive(Clone, Default)]
pub struct ObjectCache {
    inner: Arc<ObjectCacheInner>,
}

#[derive(Default)]
struct ObjectCacheInner {
    entries: RwLock<HashMap<ResourceIdentity, CachedObject>>,
    topics: Mutex<HashMap<ResourceIdentity, watch::Sender<u64>>>,
}

impl ObjectCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a representation, replacing any previous one wholesale.
    ///
    /// `put` is last-write-wins and never merges partial payloads;
    /// callers needing partial updates must read-modify-write.
    pub fn put(&self, object: CachedObject) {
        let identity = object.identity.clone();
        debug!(identity = %identity, "Object cache put");
        self.inner
            .entries
            .write()
            .insert(identity.clone(), object);
        self.notify(&identity);
    }

    /// Read a representation. Absence is not an error.
    #[must_use]
    pub fn get(&self, identity: &ResourceIdentity) -> Option<CachedObject> {
        self.inner.entries.read().get(identity).cloned()
    }

    /// Evict a representation. Returns whether one was present.
    pub fn remove(&self, identity: &ResourceIdentity) -> bool {
        let removed = self.inner.entries.write().remove(identity).is_some();
        if removed {
            debug!(identity = %identity, "Object cache evict");
            self.notify(identity);
        }
        removed
    }

    /// Whether a representation exists for the given `self` href.
    #[must_use]
    pub fn has_by_self_link(&self, href: &str) -> bool {
        self.inner
            .entries
            .read()
            .contains_key(&ResourceIdentity::from(href))
    }

    /// Subscribe to change notifications for one identity.
    ///
    /// The receiver observes a version counter that bumps on every
    /// `put`/`remove` of that identity.
    #[must_use]
    pub fn subscribe(&self, identity: &ResourceIdentity) -> watch::Receiver<u64> {
        let mut topics = self.inner.topics.lock();
        topics
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    fn notify(&self, identity: &ResourceIdentity) {
        let topics = self.inner.topics.lock();
        if let Some(sender) = topics.get(identity) {
            sender.send_modify(|version| *version += 1);
        }
    }

    /// Number of cached representations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(identity: &str, payload: Value) -> CachedObject {
        CachedObject {
            identity: ResourceIdentity::from(identity),
            payload,
            links: Links::new(),
            embedded: BTreeMap::new(),
            last_updated: Utc::now(),
            ms_to_live: 60_000,
        }
    }

    #[test]
    fn test_put_then_get_returns_latest_payload() {
        let cache = ObjectCache::new();
        let identity = ResourceIdentity::from("https://rest.api/items/1");

        cache.put(object("https://rest.api/items/1", json!({ "v": 1 })));
        cache.put(object("https://rest.api/items/1", json!({ "v": 2 })));

        // Last write wins, never a merge
        let cached = cache.get(&identity).expect("cached");
        assert_eq!(cached.payload, json!({ "v": 2 }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_absent_is_none() {
        let cache = ObjectCache::new();
        assert!(cache.get(&ResourceIdentity::from("https://rest.api/none")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_evicts() {
        let cache = ObjectCache::new();
        cache.put(object("https://rest.api/items/1", json!({})));
        assert!(cache.has_by_self_link("https://rest.api/items/1"));

        assert!(cache.remove(&ResourceIdentity::from("https://rest.api/items/1")));
        assert!(!cache.has_by_self_link("https://rest.api/items/1"));
        assert!(!cache.remove(&ResourceIdentity::from("https://rest.api/items/1")));
    }

    #[test]
    fn test_subscribe_sees_put_and_remove() {
        let cache = ObjectCache::new();
        let identity = ResourceIdentity::from("https://rest.api/items/1");
        let rx = cache.subscribe(&identity);
        assert_eq!(*rx.borrow(), 0);

        cache.put(object("https://rest.api/items/1", json!({})));
        assert_eq!(*rx.borrow(), 1);

        cache.remove(&identity);
        assert_eq!(*rx.borrow(), 2);

        // Other identities do not bump this topic
        cache.put(object("https://rest.api/items/2", json!({})));
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_staleness_is_ttl_based() {
        let mut cached = object("https://rest.api/items/1", json!({}));
        cached.ms_to_live = 1000;
        cached.last_updated = Utc::now() - chrono::Duration::milliseconds(1500);
        assert!(cached.is_stale(Utc::now()));

        cached.last_updated = Utc::now();
        assert!(!cached.is_stale(Utc::now()));
    }

    #[test]
    fn test_decodable_value_reattaches_links() {
        let mut cached = object("https://rest.api/items/1", json!({ "id": "x" }));
        cached.links.insert("self", "https://rest.api/items/1");

        let value = cached.decodable_value();
        assert_eq!(value["id"], "x");
        assert_eq!(value["_links"]["self"]["href"], "https://rest.api/items/1");
    }
}
