//! The pending-event container (§4.2).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::event::Event;

/// Ordered sequence of pending events.
///
/// Regular events are FIFO. At most one `ShutdownEvent` may be pending at a
/// time; it is held in a side slot and only surfaces from `try_pop` once the
/// regular sequence has drained, so that events already queued ahead of it
/// are never starved (Boundary Scenario 5 in the design doc).
pub struct EventStorage {
    inner: Mutex<Inner>,
}

struct Inner {
    regular: VecDeque<Arc<dyn Event>>,
    shutdown: Option<Arc<dyn Event>>,
}

impl Default for EventStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStorage {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                regular: VecDeque::new(),
                shutdown: None,
            }),
        }
    }

    /// Appends `event`. Returns `false` if `event` is a shutdown event and
    /// one is already pending.
    pub fn try_push(&self, event: Arc<dyn Event>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if event.is_shutdown() {
            if inner.shutdown.is_some() {
                return false;
            }
            inner.shutdown = Some(event);
        } else {
            inner.regular.push_back(event);
        }
        true
    }

    /// Removes and returns the next event, if any: the head of the regular
    /// sequence, or (only once that sequence is empty) the pending shutdown
    /// event.
    pub fn try_pop(&self) -> Option<Arc<dyn Event>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.regular.pop_front() {
            return Some(event);
        }
        inner.shutdown.take()
    }

    pub fn contains(&self, event: &Arc<dyn Event>) -> bool {
        let inner = self.inner.lock().unwrap();
        if let Some(shutdown) = &inner.shutdown {
            if Arc::ptr_eq(shutdown, event) {
                return true;
            }
        }
        inner.regular.iter().any(|e| Arc::ptr_eq(e, event))
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.regular.is_empty() && inner.shutdown.is_none()
    }
}
