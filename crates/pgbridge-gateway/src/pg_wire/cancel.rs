//! Cancellation registry for CancelRequest handling
//!
//! Every session registers its (pid, secret key) pair. A session arms a fresh
//! token for each backend call, so a cancel that arrives while the session is
//! idle never affects a later query.

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct Handle {
    secret_key: i32,
    token: CancellationToken,
}

/// Sessions that can currently be cancelled, keyed by backend pid
#[derive(Default)]
pub struct CancelRegistry {
    handles: DashMap<i32, Handle>,
}

impl CancelRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session; the returned guard unregisters it on drop
    pub fn register(self: &Arc<Self>, pid: i32, secret_key: i32) -> Registration {
        self.handles.insert(
            pid,
            Handle {
                secret_key,
                token: CancellationToken::new(),
            },
        );
        debug!(pid, "Session registered for cancellation");
        Registration {
            registry: Arc::clone(self),
            pid,
        }
    }

    /// Cancel the in-flight call of `pid` when `secret_key` matches.
    ///
    /// Returns whether a token was cancelled.
    pub fn cancel(&self, pid: i32, secret_key: i32) -> bool {
        match self.handles.get(&pid) {
            Some(handle) if handle.secret_key == secret_key => {
                handle.token.cancel();
                info!(pid, "Cancel request honoured");
                true
            }
            Some(_) => {
                info!(pid, "Cancel request ignored: secret key mismatch");
                false
            }
            None => {
                debug!(pid, "Cancel request for unknown session");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// A session's entry in the registry
pub struct Registration {
    registry: Arc<CancelRegistry>,
    pid: i32,
}

impl Registration {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Fresh token for the next backend call
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(mut handle) = self.registry.handles.get_mut(&self.pid) {
            handle.token = token.clone();
        }
        token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.handles.remove(&self.pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_requires_matching_secret() {
        let registry = CancelRegistry::new();
        let registration = registry.register(7, 1234);
        let token = registration.arm();

        assert!(!registry.cancel(7, 999));
        assert!(!token.is_cancelled());
        assert!(registry.cancel(7, 1234));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_rearm_ignores_earlier_cancel() {
        let registry = CancelRegistry::new();
        let registration = registry.register(1, 1);
        let first = registration.arm();
        registry.cancel(1, 1);
        assert!(first.is_cancelled());
        assert!(!registration.arm().is_cancelled());
    }

    #[test]
    fn test_drop_unregisters() {
        let registry = CancelRegistry::new();
        {
            let _registration = registry.register(3, 3);
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
        assert!(!registry.cancel(3, 3));
    }
}
