//! The request tracker and orchestrator.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use quince_core::{RawResource, ResourceIdentity};

use crate::cache::{CachedObject, ObjectCache};
use crate::error::RemoteDataError;
use crate::request::models::{RequestDescriptor, RequestEntry, RequestMethod, RequestState};
use crate::transport::Transport;

/// The handle returned by [`RequestService::configure`].
///
/// Several concurrent GET callers for the same href receive handles
/// observing the same underlying [`RequestEntry`].
#[derive(Debug)]
pub struct ConfiguredRequest {
    /// Identifier of the entry being observed. When the configure call
    /// attached to an existing entry this is that entry's id, not the
    /// one from the submitted descriptor.
    pub request_id: Uuid,
    /// Live view of the entry's lifecycle state.
    pub entry: watch::Receiver<RequestEntry>,
    /// Whether an existing entry was reused instead of dispatching.
    pub reused: bool,
}

/// Tracks requests by id and by (method, href), deduplicates, dispatches.
///
/// Cloning is cheap; all clones share one tracker and one object cache.
/// All tracker mutations are synchronous critical sections - the lock is
/// never held across an await point, so the at-most-one-in-flight
/// invariant cannot be violated by interleaved completions.
#[derive(Clone)]
pub struct RequestService {
    inner: Arc<RequestServiceInner>,
}

struct RequestServiceInner {
    transport: Arc<dyn Transport>,
    cache: ObjectCache,
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    by_id: HashMap<Uuid, Arc<watch::Sender<RequestEntry>>>,
    by_key: HashMap<(RequestMethod, String), Uuid>,
}

impl RequestService {
    /// Create a service over the given transport and cache.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, cache: ObjectCache) -> Self {
        Self {
            inner: Arc::new(RequestServiceInner {
                transport,
                cache,
                state: Mutex::new(TrackerState::default()),
            }),
        }
    }

    /// The shared object cache this service writes to.
    #[must_use]
    pub fn cache(&self) -> &ObjectCache {
        &self.inner.cache
    }

    /// A fresh request identifier, collision-free within the process.
    #[must_use]
    pub fn generate_request_id() -> Uuid {
        Uuid::new_v4()
    }

    /// Submit a request descriptor.
    ///
    /// GETs are deduplicated by href: if an entry already exists - still
    /// in flight, or a fresh success - the caller is attached to that
    /// entry instead of a new network call being dispatched, so at most
    /// one GET per unique href is in flight at any time. Writes carry
    /// distinct bodies and always dispatch their own call.
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, href = %descriptor.href))]
    pub fn configure(&self, descriptor: RequestDescriptor) -> ConfiguredRequest {
        let key = (descriptor.method, descriptor.href.clone());

        let (sender, reused) = {
            let mut state = self.inner.state.lock();

            if let Some(existing) = state
                .by_key
                .get(&key)
                .and_then(|id| state.by_id.get(id))
                .cloned()
            {
                let entry = existing.borrow().clone();
                // Only GETs attach to an existing entry; a write to the
                // same href has its own body and must reach the wire. A
                // stale GET success only forces a re-issue when the
                // caller's staleness policy asks for it; otherwise the
                // outdated entry is served as-is.
                let attach = descriptor.method == RequestMethod::Get
                    && (!entry.is_terminal()
                        || (entry.is_success()
                            && !(descriptor.re_request_on_stale
                                && entry.is_stale(Utc::now()))));
                if attach {
                    debug!(request_id = %entry.request_id, "Attaching to existing request");
                    (existing, true)
                } else {
                    (self.track_new(&mut state, &descriptor, key), false)
                }
            } else {
                (self.track_new(&mut state, &descriptor, key), false)
            }
        };

        let request_id = sender.borrow().request_id;
        let receiver = sender.subscribe();

        if !reused {
            debug!(request_id = %request_id, "Dispatching request");
            let service = self.clone();
            tokio::spawn(async move {
                service.dispatch(descriptor, sender).await;
            });
        }

        ConfiguredRequest {
            request_id,
            entry: receiver,
            reused,
        }
    }

    /// Look up the live entry view for a request id.
    #[must_use]
    pub fn get_by_id(&self, request_id: Uuid) -> Option<watch::Receiver<RequestEntry>> {
        self.inner
            .state
            .lock()
            .by_id
            .get(&request_id)
            .map(|sender| sender.subscribe())
    }

    /// Look up the live entry view for a (method, href) pair.
    #[must_use]
    pub fn get_by_href(
        &self,
        method: RequestMethod,
        href: &str,
    ) -> Option<watch::Receiver<RequestEntry>> {
        let state = self.inner.state.lock();
        state
            .by_key
            .get(&(method, href.to_string()))
            .and_then(|id| state.by_id.get(id))
            .map(|sender| sender.subscribe())
    }

    /// Explicit invalidation: mark every tracked entry whose href contains
    /// `pattern` as stale, so the next configure re-issues the call.
    ///
    /// Used after writes that affect dynamic listing endpoints. In-flight
    /// entries keep their observers; the flag takes effect once they
    /// complete.
    #[instrument(skip(self))]
    pub fn remove_by_href_substring(&self, pattern: &str) {
        let state = self.inner.state.lock();
        let mut marked = 0usize;
        for ((_, href), id) in &state.by_key {
            if href.contains(pattern)
                && let Some(sender) = state.by_id.get(id)
            {
                sender.send_modify(|entry| entry.flagged_stale = true);
                marked += 1;
            }
        }
        debug!(marked, "Invalidated tracked requests by href substring");
    }

    fn track_new(
        &self,
        state: &mut TrackerState,
        descriptor: &RequestDescriptor,
        key: (RequestMethod, String),
    ) -> Arc<watch::Sender<RequestEntry>> {
        let sender = Arc::new(watch::channel(RequestEntry::pending(descriptor)).0);
        // Drop the tracker's reference to a replaced entry; observers that
        // still hold receivers keep it alive on their own.
        if let Some(previous) = state.by_key.insert(key, descriptor.request_id) {
            state.by_id.remove(&previous);
        }
        state.by_id.insert(descriptor.request_id, sender.clone());
        sender
    }

    async fn dispatch(&self, descriptor: RequestDescriptor, sender: Arc<watch::Sender<RequestEntry>>) {
        let result = self
            .inner
            .transport
            .issue(descriptor.method, &descriptor.href, descriptor.body.clone())
            .await;

        let now = Utc::now();
        let state = match result {
            Err(e) => {
                warn!(href = %descriptor.href, error = %e, "Transport failure");
                RequestState::Error(RemoteDataError::Transport(e.message))
            }
            Ok(response) if !response.is_success() => {
                let message = response
                    .payload
                    .as_ref()
                    .map(error_message)
                    .unwrap_or_default();
                debug!(href = %descriptor.href, status = response.status_code, "HTTP error response");
                RequestState::Error(RemoteDataError::HttpStatus {
                    status: response.status_code,
                    message,
                })
            }
            Ok(response) => {
                // Cache update happens before dependents are notified
                let identity = self.apply_success(&descriptor, response.payload, now);
                RequestState::Success {
                    status: response.status_code,
                    identity,
                }
            }
        };

        sender.send_modify(|entry| {
            entry.state = state.clone();
            entry.response_timestamp = Some(now);
        });
    }

    /// On success: normalize the payload into the object cache, and for
    /// write methods invalidate what the write affected.
    fn apply_success(
        &self,
        descriptor: &RequestDescriptor,
        payload: Option<Value>,
        now: DateTime<Utc>,
    ) -> Option<ResourceIdentity> {
        let parsed =
            payload.and_then(|value| serde_json::from_value::<RawResource>(value).ok());

        if descriptor.method == RequestMethod::Get {
            let raw = parsed?;
            let fallback = ResourceIdentity::from(descriptor.href.as_str());
            return Some(self.normalize(raw, Some(fallback), descriptor.ms_to_live, now));
        }

        // A write: the cached representation and any GET entry for the
        // same href are no longer trustworthy.
        let target = ResourceIdentity::from(descriptor.href.as_str());
        let identity = match parsed {
            // The server returned the updated representation; replacing
            // the cached object is the invalidation.
            Some(raw) if raw.identity().is_some() => {
                Some(self.normalize(raw, None, descriptor.ms_to_live, now))
            }
            _ => {
                self.inner.cache.remove(&target);
                None
            }
        };

        if let Some(sender) = {
            let state = self.inner.state.lock();
            state
                .by_key
                .get(&(RequestMethod::Get, descriptor.href.clone()))
                .and_then(|id| state.by_id.get(id))
                .cloned()
        } {
            sender.send_modify(|entry| entry.flagged_stale = true);
        }

        identity
    }

    /// Store a raw resource and, recursively, every `_embedded` child that
    /// carries its own `self` link.
    fn normalize(
        &self,
        raw: RawResource,
        fallback: Option<ResourceIdentity>,
        ms_to_live: u64,
        now: DateTime<Utc>,
    ) -> ResourceIdentity {
        let identity = raw
            .identity()
            .or(fallback)
            .unwrap_or_else(|| ResourceIdentity::from(""));

        let mut embedded = BTreeMap::new();
        for (relation, value) in &raw.embedded {
            let children: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };

            let mut identities = Vec::new();
            for child in children {
                match serde_json::from_value::<RawResource>((*child).clone()) {
                    Ok(child_raw) if child_raw.identity().is_some() => {
                        identities.push(self.normalize(child_raw, None, ms_to_live, now));
                    }
                    _ => {
                        debug!(relation, "Embedded value without self link, not normalized");
                    }
                }
            }
            embedded.insert(relation.clone(), identities);
        }

        self.inner.cache.put(CachedObject {
            identity: identity.clone(),
            payload: raw.payload_value(),
            links: raw.links,
            embedded,
            last_updated: now,
            ms_to_live,
        });

        identity
    }
}

fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.chars().take(200).collect(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| payload.to_string(), ToString::to_string),
        other => other.to_string(),
    }
}
