//! Handler registration and isolated dispatch
//!
//! Every registration on the client returns a [`HandlerId`] that can later be
//! passed to `remove_handler`. Handlers for the same event run in registration
//! order, and a panicking handler does not stop the ones after it.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Token returned by every handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Shared callback
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of handlers for one event kind
pub(crate) struct HandlerSet<T: ?Sized> {
    handlers: Vec<(HandlerId, Handler<T>)>,
}

impl<T: ?Sized> HandlerSet<T> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: HandlerId, handler: Handler<T>) {
        self.handlers.push((id, handler));
    }

    /// Remove a handler; unknown ids are ignored
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler with `value`; returns how many panicked
    pub fn dispatch(&self, value: &T) -> usize {
        self.handlers
            .iter()
            .filter(|(id, handler)| !invoke_isolated(id, handler.as_ref(), value))
            .count()
    }
}

impl<T: ?Sized> Default for HandlerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one callback, containing a panic; returns false if it panicked
pub(crate) fn invoke_isolated<T: ?Sized>(
    label: &dyn fmt::Display,
    handler: &(dyn Fn(&T) + Send + Sync),
    value: &T,
) -> bool {
    match catch_unwind(AssertUnwindSafe(|| handler(value))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::warn!(
                handler = %label,
                panic = %panic_message(payload.as_ref()),
                "Handler panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
