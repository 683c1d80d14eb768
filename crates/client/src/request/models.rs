//! Request descriptors and lifecycle entries.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use quince_core::{PatchOperation, ResourceIdentity};

use crate::error::RemoteDataError;

/// HTTP method of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

impl From<RequestMethod> for reqwest::Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => Self::GET,
            RequestMethod::Post => Self::POST,
            RequestMethod::Put => Self::PUT,
            RequestMethod::Patch => Self::PATCH,
            RequestMethod::Delete => Self::DELETE,
        }
    }
}

/// What a caller submits to the orchestrator: one logical request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Caller-generated identifier, unique within the process lifetime.
    pub request_id: Uuid,
    /// HTTP method.
    pub method: RequestMethod,
    /// Target URL.
    pub href: String,
    /// Request body, if any.
    pub body: Option<Value>,
    /// Time-to-live for cached results of this request, in milliseconds.
    pub ms_to_live: u64,
    /// Whether reading a stale tracked entry re-issues the call instead
    /// of silently serving outdated data. Always explicit, never
    /// defaulted.
    pub re_request_on_stale: bool,
}

impl RequestDescriptor {
    /// A GET request with the given TTL and staleness policy.
    #[must_use]
    pub fn get(
        request_id: Uuid,
        href: impl Into<String>,
        ms_to_live: u64,
        re_request_on_stale: bool,
    ) -> Self {
        Self {
            request_id,
            method: RequestMethod::Get,
            href: href.into(),
            body: None,
            ms_to_live,
            re_request_on_stale,
        }
    }

    /// A PATCH request carrying a JSON-Patch batch in insertion order.
    #[must_use]
    pub fn patch(request_id: Uuid, href: impl Into<String>, operations: &[PatchOperation]) -> Self {
        Self {
            request_id,
            method: RequestMethod::Patch,
            href: href.into(),
            body: serde_json::to_value(operations).ok(),
            ms_to_live: 0,
            re_request_on_stale: false,
        }
    }

    /// A POST request with a JSON body.
    #[must_use]
    pub fn post(request_id: Uuid, href: impl Into<String>, body: Value) -> Self {
        Self {
            request_id,
            method: RequestMethod::Post,
            href: href.into(),
            body: Some(body),
            ms_to_live: 0,
            re_request_on_stale: false,
        }
    }

    /// A DELETE request.
    #[must_use]
    pub fn delete(request_id: Uuid, href: impl Into<String>) -> Self {
        Self {
            request_id,
            method: RequestMethod::Delete,
            href: href.into(),
            body: None,
            ms_to_live: 0,
            re_request_on_stale: false,
        }
    }
}

/// Lifecycle state of a tracked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Dispatched (or about to be), no response yet.
    Pending,
    /// 2xx response received and the object cache updated.
    Success {
        /// Response status code.
        status: u16,
        /// Identity of the cached object the response resolved to.
        identity: Option<ResourceIdentity>,
    },
    /// Transport failure or non-2xx response. Terminal.
    Error(RemoteDataError),
}

/// One tracked request: descriptor identity plus lifecycle state.
///
/// Invariant (enforced by the tracker): at most one non-terminal entry
/// per (method, href) at any instant.
#[derive(Debug, Clone)]
pub struct RequestEntry {
    /// Identifier of the request that created this entry.
    pub request_id: Uuid,
    /// HTTP method.
    pub method: RequestMethod,
    /// Target URL.
    pub href: String,
    /// Current lifecycle state.
    pub state: RequestState,
    /// When the response arrived, for terminal entries.
    pub response_timestamp: Option<DateTime<Utc>>,
    /// TTL after which a successful entry is considered stale.
    pub ms_to_live: u64,
    /// Set by explicit invalidation; forces the next configure to re-issue.
    pub flagged_stale: bool,
}

impl RequestEntry {
    /// A fresh pending entry for `descriptor`.
    #[must_use]
    pub fn pending(descriptor: &RequestDescriptor) -> Self {
        Self {
            request_id: descriptor.request_id,
            method: descriptor.method,
            href: descriptor.href.clone(),
            state: RequestState::Pending,
            response_timestamp: None,
            ms_to_live: descriptor.ms_to_live,
            flagged_stale: false,
        }
    }

    /// Whether the entry reached Success or Error.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.state, RequestState::Pending)
    }

    /// Whether the entry completed successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.state, RequestState::Success { .. })
    }

    /// Staleness check, evaluated lazily on read.
    ///
    /// A successful entry is stale once its age exceeds `ms_to_live`, or
    /// immediately after explicit invalidation. Pending and errored
    /// entries are never stale.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if !self.is_success() {
            return false;
        }
        if self.flagged_stale {
            return true;
        }
        self.response_timestamp.is_some_and(|completed| {
            let age = now.signed_duration_since(completed);
            age.num_milliseconds() >= 0 && age.num_milliseconds() as u64 > self.ms_to_live
        })
    }
}
