//! The `RemoteData` state union and its observable handle.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::RemoteDataError;

/// Lifecycle of one remotely-fetched value.
///
/// Observers always see states in the order
/// `RequestPending -> (ResponsePending)* -> Success | Error`; a terminal
/// state is never followed by another terminal state for the same request
/// without an explicit re-configure.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteData<T> {
    /// The request has been configured but no response has arrived.
    RequestPending,
    /// The response arrived; declared follow-links are still resolving.
    ResponsePending,
    /// The resource and all eagerly required follow-links resolved.
    Success {
        /// The decoded payload.
        payload: T,
        /// When the request completed.
        time_completed: DateTime<Utc>,
        /// Whether the backing cache entry has outlived its TTL.
        is_stale: bool,
    },
    /// Terminal failure for this request. Callers that want to retry
    /// must configure a new request.
    Error {
        /// HTTP status code, absent for transport failures.
        status_code: Option<u16>,
        /// Failure description.
        message: String,
        /// When the failure was observed.
        time_completed: DateTime<Utc>,
    },
}

impl<T> RemoteData<T> {
    /// Terminal error from a [`RemoteDataError`].
    #[must_use]
    pub fn from_error(error: &RemoteDataError, time_completed: DateTime<Utc>) -> Self {
        Self::Error {
            status_code: error.status_code(),
            message: error.to_string(),
            time_completed,
        }
    }

    /// Whether this is `Success` or `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }

    /// Whether this is `Success`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the payload is stale (always false outside `Success`).
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Success { is_stale: true, .. })
    }

    /// The payload, when successful.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Consume into the payload, when successful.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// The payload, or the error translated into [`RemoteDataError`].
    ///
    /// # Errors
    ///
    /// Returns the terminal error; pending states map to a transport
    /// error, which callers avoid by waiting for a terminal state first.
    pub fn into_result(self) -> Result<T, RemoteDataError> {
        match self {
            Self::Success { payload, .. } => Ok(payload),
            Self::Error {
                status_code,
                message,
                ..
            } => Err(status_code.map_or_else(
                || RemoteDataError::Transport(message.clone()),
                |status| RemoteDataError::HttpStatus {
                    status,
                    message: message.clone(),
                },
            )),
            Self::RequestPending | Self::ResponsePending => {
                Err(RemoteDataError::Transport("still pending".to_string()))
            }
        }
    }
}

/// Observable handle over a remote data lifecycle.
///
/// Dropping the handle abandons the observation; the underlying request
/// still completes and updates the shared cache for any other party.
#[derive(Debug)]
pub struct RemoteDataWatch<T> {
    receiver: watch::Receiver<RemoteData<T>>,
}

impl<T: Clone> RemoteDataWatch<T> {
    pub(crate) fn new(receiver: watch::Receiver<RemoteData<T>>) -> Self {
        Self { receiver }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> RemoteData<T> {
        self.receiver.borrow().clone()
    }

    /// Wait until the next state change.
    ///
    /// Returns `false` when the producing side has gone away.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait for `Success` or `Error` and return it.
    ///
    /// If the producer disappears first, the last observed state is
    /// returned as-is.
    pub async fn wait_for_terminal(&mut self) -> RemoteData<T> {
        loop {
            let state = self.receiver.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if self.receiver.changed().await.is_err() {
                return self.receiver.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        let pending: RemoteData<u32> = RemoteData::RequestPending;
        assert!(!pending.is_terminal());
        assert!(!pending.is_stale());
        assert!(pending.payload().is_none());

        let success = RemoteData::Success {
            payload: 7u32,
            time_completed: Utc::now(),
            is_stale: true,
        };
        assert!(success.is_terminal());
        assert!(success.is_success());
        assert!(success.is_stale());
        assert_eq!(success.payload(), Some(&7));
        assert_eq!(success.into_payload(), Some(7));
    }

    #[test]
    fn test_into_result_maps_errors() {
        let error: RemoteData<u32> = RemoteData::Error {
            status_code: Some(404),
            message: "HTTP 404: gone".to_string(),
            time_completed: Utc::now(),
        };
        match error.into_result() {
            Err(RemoteDataError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected http error, got {other:?}"),
        }

        let transport: RemoteData<u32> = RemoteData::Error {
            status_code: None,
            message: "refused".to_string(),
            time_completed: Utc::now(),
        };
        assert!(matches!(
            transport.into_result(),
            Err(RemoteDataError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_watch_sees_terminal() {
        let (tx, rx) = watch::channel(RemoteData::<u32>::RequestPending);
        let mut watch = RemoteDataWatch::new(rx);

        tokio::spawn(async move {
            tx.send_replace(RemoteData::ResponsePending);
            tx.send_replace(RemoteData::Success {
                payload: 1,
                time_completed: Utc::now(),
                is_stale: false,
            });
        });

        let terminal = watch.wait_for_terminal().await;
        assert!(terminal.is_success());
    }
}
