//! Request registry - one-shot response callbacks keyed by request id.
//!
//! Each entry is removed exactly once: when its response is dispatched,
//! when it is unregistered, when its deadline passes, or when the
//! connection closes.
//!
//! # Example
//!
//! ```
//! use amlink::handler::RequestRegistry;
//! use amlink::protocol::{Header, LogicalMessage};
//! use serde_json::Value;
//!
//! let mut registry = RequestRegistry::new();
//! registry.register(1, "floatsum", None, Box::new(|res| {
//!     assert_eq!(res.unwrap().cmd(), "floatsum");
//! }));
//!
//! let reply = LogicalMessage::new(Header::new("floatsum", 0, 1, Value::Null), Vec::new());
//! assert!(registry.complete(reply).is_ok());
//! assert!(registry.is_empty());
//! ```

use std::collections::HashMap;

use tokio::time::Instant;

use crate::error::{AmError, Result};
use crate::protocol::{LogicalMessage, RequestId};

/// Callback invoked once with the response, or with the reason none came.
pub type ResponseCallback = Box<dyn FnOnce(Result<LogicalMessage>) + Send + 'static>;

/// Entry for an outstanding request.
struct PendingRequest {
    /// Completion callback.
    callback: ResponseCallback,
    /// Command the request was sent with (for logs).
    cmd: String,
    /// When the request expires, if ever.
    deadline: Option<Instant>,
}

/// Registry mapping outstanding request ids to callbacks.
#[derive(Default)]
pub struct RequestRegistry {
    pending: HashMap<RequestId, PendingRequest>,
}

impl RequestRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `id`.
    ///
    /// An existing callback for the same id is replaced and returned.
    pub fn register(
        &mut self,
        id: RequestId,
        cmd: &str,
        deadline: Option<Instant>,
        callback: ResponseCallback,
    ) -> Option<ResponseCallback> {
        let previous = self.pending.insert(
            id,
            PendingRequest {
                callback,
                cmd: cmd.to_string(),
                deadline,
            },
        );

        previous.map(|old| {
            tracing::warn!(request = id, cmd = %old.cmd, "Replacing pending callback");
            old.callback
        })
    }

    /// Remove a callback without invoking it.
    pub fn unregister(&mut self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Remove and return the callback for `id`.
    pub fn take(&mut self, id: RequestId) -> Option<ResponseCallback> {
        self.pending.remove(&id).map(|p| p.callback)
    }

    /// Deliver a completed message to its callback.
    ///
    /// Returns the message back if no callback is registered for its id.
    pub fn complete(&mut self, message: LogicalMessage) -> std::result::Result<(), LogicalMessage> {
        match self.take(message.request_id()) {
            Some(callback) => {
                callback(Ok(message));
                Ok(())
            }
            None => Err(message),
        }
    }

    /// Evict every request whose deadline is at or before `now`.
    ///
    /// Each evicted callback is invoked with [`AmError::RequestExpired`].
    /// Returns the number of evicted requests.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline.is_some_and(|d| d <= now))
            .map(|(&id, _)| id)
            .collect();

        for &id in &expired {
            if let Some(p) = self.pending.remove(&id) {
                tracing::debug!(request = id, cmd = %p.cmd, "Request expired");
                (p.callback)(Err(AmError::RequestExpired(id)));
            }
        }

        expired.len()
    }

    /// Fail every outstanding request.
    pub fn fail_all<F>(&mut self, mut error: F) -> usize
    where
        F: FnMut(RequestId) -> AmError,
    {
        let drained: Vec<_> = self.pending.drain().collect();
        let count = drained.len();
        for (id, p) in drained {
            (p.callback)(Err(error(id)));
        }
        count
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Outstanding request ids, ascending.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<_> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Header;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> ResponseCallback {
        let log = log.clone();
        Box::new(move |res| {
            let entry = match res {
                Ok(msg) => format!("{tag}:ok:{}", msg.request_id()),
                Err(e) => format!("{tag}:err:{e}"),
            };
            log.lock().unwrap().push(entry);
        })
    }

    fn reply(id: RequestId) -> LogicalMessage {
        LogicalMessage::new(Header::new("reply", 0, id, Value::Null), Vec::new())
    }

    #[test]
    fn test_complete_is_one_shot() {
        let log = Log::default();
        let mut registry = RequestRegistry::new();
        registry.register(7, "floatsum", None, recorder(&log, "a"));

        assert!(registry.complete(reply(7)).is_ok());
        assert!(registry.complete(reply(7)).is_err());

        assert_eq!(*log.lock().unwrap(), vec!["a:ok:7"]);
        assert!(!registry.contains(7));
    }

    #[test]
    fn test_unknown_id_returns_message() {
        let mut registry = RequestRegistry::new();
        let msg = registry.complete(reply(3)).unwrap_err();
        assert_eq!(msg.request_id(), 3);
    }

    #[test]
    fn test_register_replaces() {
        let log = Log::default();
        let mut registry = RequestRegistry::new();

        assert!(registry.register(1, "a", None, recorder(&log, "first")).is_none());
        assert!(registry.register(1, "a", None, recorder(&log, "second")).is_some());
        assert_eq!(registry.len(), 1);

        registry.complete(reply(1)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["second:ok:1"]);
    }

    #[test]
    fn test_unregister_does_not_invoke() {
        let log = Log::default();
        let mut registry = RequestRegistry::new();
        registry.register(2, "x", None, recorder(&log, "a"));

        assert!(registry.unregister(2));
        assert!(!registry.unregister(2));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_expire_only_past_deadlines() {
        let log = Log::default();
        let mut registry = RequestRegistry::new();
        let now = Instant::now();

        registry.register(1, "x", Some(now), recorder(&log, "due"));
        registry.register(2, "x", Some(now + Duration::from_secs(10)), recorder(&log, "later"));
        registry.register(3, "x", None, recorder(&log, "never"));

        assert_eq!(registry.expire(now), 1);
        assert_eq!(registry.pending_ids(), vec![2, 3]);
        assert_eq!(*log.lock().unwrap(), vec!["due:err:Request 1 expired"]);
    }

    #[test]
    fn test_fail_all() {
        let log = Log::default();
        let mut registry = RequestRegistry::new();
        registry.register(1, "x", None, recorder(&log, "a"));
        registry.register(2, "x", None, recorder(&log, "b"));

        assert_eq!(registry.fail_all(|_| AmError::ConnectionClosed), 2);
        assert!(registry.is_empty());

        let mut entries = log.lock().unwrap().clone();
        entries.sort();
        assert_eq!(entries, vec!["a:err:Connection closed", "b:err:Connection closed"]);
    }
}
