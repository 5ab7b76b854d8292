//! Typed publish/subscribe registry for inbound push messages.
//!
//! Listeners are keyed by [`EventKind`] and compared by identity: the same
//! `Arc` registered twice for one kind is stored once. A listener that
//! errors or panics is logged and skipped; the rest still receive the
//! message.

use std::collections::HashMap;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::ClientId;
use crate::domain::sync::{EventKind, PushMessage};

pub type ListenerError = Box<dyn Error + Send + Sync>;

pub trait EventListener: Send + Sync {
    fn on_event(&self, message: &PushMessage) -> Result<(), ListenerError>;

    /// Used in logs only.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> EventListener for F
where
    F: Fn(&PushMessage) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, message: &PushMessage) -> Result<(), ListenerError> {
        self(message)
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct EventBus {
    local: ClientId,
    listeners: RwLock<HashMap<EventKind, Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    /// Bus for the session `local`; inbound echoes of its own events are dropped.
    pub fn new(local: ClientId) -> Self {
        Self {
            local,
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_client(&self) -> &ClientId {
        &self.local
    }

    /// Register `listener` for `kind`. Returns false if it was already there.
    pub fn on(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let registered = listeners.entry(kind).or_default();
        if registered.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        registered.push(listener);
        true
    }

    /// Remove one listener, or every listener for `kind` when `None`.
    /// Returns how many were removed.
    pub fn off(&self, kind: EventKind, listener: Option<&Arc<dyn EventListener>>) -> usize {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match listener {
            None => listeners.remove(&kind).map_or(0, |removed| removed.len()),
            Some(target) => {
                let Some(registered) = listeners.get_mut(&kind) else {
                    return 0;
                };
                let before = registered.len();
                registered.retain(|l| !same_listener(l, target));
                let removed = before - registered.len();
                if registered.is_empty() {
                    listeners.remove(&kind);
                }
                removed
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `message` to every listener of its kind.
    pub fn dispatch(&self, message: &PushMessage) -> DispatchReport {
        // Snapshot so listeners may (un)register without deadlocking.
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.kind)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(message))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        event_type = %message.kind,
                        listener = listener.name(),
                        error = %e,
                        "Listener failed"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!(
                        event_type = %message.kind,
                        listener = listener.name(),
                        "Listener panicked"
                    );
                }
            }
        }
        report
    }

    /// Dispatch a message received from the server, unless it is this
    /// session's own echo.
    pub fn dispatch_inbound(&self, message: &PushMessage) -> Option<DispatchReport> {
        if message.is_echo_for(&self.local) {
            tracing::trace!(event_type = %message.kind, "Dropping own echo");
            return None;
        }
        Some(self.dispatch(message))
    }
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
