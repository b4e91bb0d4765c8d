//! Strong or weak references to a handler, plus the event type they accept
//! (§4.3).

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::HandlerError;
use crate::event::Event;
use crate::handler::Handler;

/// The result of comparing a [`HandlerRef`]'s target against a candidate
/// handler. A weak ref whose target has been collected can neither confirm
/// nor deny identity.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TargetEquality {
    Yes,
    No,
    Unknown,
}

enum Target {
    Strong(Arc<dyn Handler>),
    Weak(Weak<dyn Handler>),
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A registration record coupling one handler to one event type.
pub struct HandlerRef {
    id: u64,
    event_type: TypeId,
    event_type_name: &'static str,
    target: Target,
}

impl HandlerRef {
    pub fn strong(handler: Arc<dyn Handler>, event_type: TypeId, event_type_name: &'static str) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            event_type,
            event_type_name,
            target: Target::Strong(handler),
        }
    }

    pub fn weak(handler: &Arc<dyn Handler>, event_type: TypeId, event_type_name: &'static str) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            event_type,
            event_type_name,
            target: Target::Weak(Arc::downgrade(handler)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_type_name(&self) -> &'static str {
        self.event_type_name
    }

    /// True if `event`'s concrete type is the one this ref was registered for.
    pub fn matches(&self, event: &dyn Event) -> bool {
        event.as_any().type_id() == self.event_type
    }

    /// Compares this ref's target against `other` by reference identity.
    pub fn same_target(&self, other: &Arc<dyn Handler>) -> TargetEquality {
        match self.live_handler() {
            Some(h) => {
                if Arc::ptr_eq(&h, other) {
                    TargetEquality::Yes
                } else {
                    TargetEquality::No
                }
            }
            None => TargetEquality::Unknown,
        }
    }

    /// True if this is a weak ref whose target has been collected.
    pub fn is_dead(&self) -> bool {
        matches!(&self.target, Target::Weak(w) if w.upgrade().is_none())
    }

    /// Invokes the handler if its target is still live.
    ///
    /// Returns `Ok(true)` if a live target was found and it returned `Ok`,
    /// `Ok(false)` if the target was dead, or the handler's error.
    pub fn deliver(&self, event: &dyn Event) -> Result<bool, HandlerError> {
        match self.live_handler() {
            Some(handler) => handler.handle(event).map(|()| true),
            None => Ok(false),
        }
    }

    fn live_handler(&self) -> Option<Arc<dyn Handler>> {
        match &self.target {
            Target::Strong(h) => Some(Arc::clone(h)),
            Target::Weak(w) => w.upgrade(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_site::SourceSiteCell;

    #[derive(Debug, Default)]
    struct TestEvent {
        site: SourceSiteCell,
    }
    impl Event for TestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    struct NoopHandler;
    impl Handler for NoopHandler {
        fn handle(&self, _event: &dyn Event) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn strong_ref_matches_exact_type() {
        let handler: Arc<dyn Handler> = Arc::new(NoopHandler);
        let r = HandlerRef::strong(handler, TypeId::of::<TestEvent>(), "TestEvent");
        assert!(r.matches(&TestEvent::default()));
    }

    #[test]
    fn weak_ref_becomes_dead_after_drop() {
        let handler: Arc<dyn Handler> = Arc::new(NoopHandler);
        let r = HandlerRef::weak(&handler, TypeId::of::<TestEvent>(), "TestEvent");
        assert!(!r.is_dead());
        drop(handler);
        assert!(r.is_dead());
        assert_eq!(r.deliver(&TestEvent::default()).unwrap(), false);
    }

    #[test]
    fn same_target_is_unknown_once_collected() {
        let handler: Arc<dyn Handler> = Arc::new(NoopHandler);
        let other: Arc<dyn Handler> = Arc::clone(&handler);
        let r = HandlerRef::weak(&handler, TypeId::of::<TestEvent>(), "TestEvent");
        assert_eq!(r.same_target(&other), TargetEquality::Yes);
        drop(handler);
        drop(other);
        assert_eq!(
            r.same_target(&(Arc::new(NoopHandler) as Arc<dyn Handler>)),
            TargetEquality::Unknown
        );
    }
}
