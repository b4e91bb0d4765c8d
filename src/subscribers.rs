//! The thread-safe set of [`HandlerRef`]s keyed by event type (§4.4).

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::HandlerFailure;
use crate::event::Event;
use crate::handler::Handler;
use crate::handler_ref::{HandlerRef, TargetEquality};

/// The outcome of dispatching one event to every matching subscriber.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

/// A set of [`HandlerRef`]s, bucketed by the `TypeId` of the event type they
/// were registered against.
pub struct SubscriberCollection {
    inner: Mutex<Inner>,
}

struct Inner {
    by_type: FxHashMap<TypeId, Vec<HandlerRef>>,
    closed: bool,
}

impl Default for SubscriberCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberCollection {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_type: FxHashMap::default(),
                closed: false,
            }),
        }
    }

    /// Adds a strong ref for `handler` against `event_type`. No-op (returns
    /// `false`) if a live ref for the same `(handler, event_type)` pair
    /// already exists, or if the collection has been closed.
    pub fn add(
        &self,
        handler: Arc<dyn Handler>,
        event_type: TypeId,
        event_type_name: &'static str,
    ) -> bool {
        let handler_for_ref = Arc::clone(&handler);
        self.add_ref(
            event_type,
            &handler,
            move || HandlerRef::strong(handler_for_ref, event_type, event_type_name),
        )
    }

    /// Adds a weak ref for `handler` against `event_type`.
    pub fn add_weak(
        &self,
        handler: &Arc<dyn Handler>,
        event_type: TypeId,
        event_type_name: &'static str,
    ) -> bool {
        self.add_ref(event_type, handler, || {
            HandlerRef::weak(handler, event_type, event_type_name)
        })
    }

    fn add_ref(
        &self,
        event_type: TypeId,
        handler: &Arc<dyn Handler>,
        make_ref: impl FnOnce() -> HandlerRef,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return false;
        }
        let bucket = inner.by_type.entry(event_type).or_default();
        let already_present = bucket
            .iter()
            .any(|r| matches!(r.same_target(handler), TargetEquality::Yes));
        if already_present {
            return false;
        }
        bucket.push(make_ref());
        true
    }

    /// Finds every event type `handler` declares support for via
    /// [`Handler::accepted_event_types`] and adds a ref for each.
    ///
    /// `names` supplies the human-readable name for each declared type, in
    /// the same order as `handler.accepted_event_types()`; entries beyond
    /// `names`'s length fall back to `"<unknown>"`.
    pub fn add_all(&self, handler: Arc<dyn Handler>, weak: bool, names: &[&'static str]) -> usize {
        let mut added = 0;
        for (i, ty) in handler.accepted_event_types().into_iter().enumerate() {
            let name = names.get(i).copied().unwrap_or("<unknown>");
            let ok = if weak {
                self.add_weak(&handler, ty, name)
            } else {
                self.add(Arc::clone(&handler), ty, name)
            };
            if ok {
                added += 1;
            }
        }
        added
    }

    /// Removes every ref whose target is `handler` (by identity), across all
    /// event types. Dead (`Unknown`) refs are swept as a side effect.
    pub fn remove(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let mut removed_any = false;
        for bucket in inner.by_type.values_mut() {
            let before = bucket.len();
            bucket.retain(|r| !matches!(r.same_target(handler), TargetEquality::Yes | TargetEquality::Unknown));
            if bucket.len() != before {
                removed_any = true;
            }
        }
        removed_any
    }

    /// Dispatches `event` to every matching, live ref in insertion order.
    /// Dead weak refs encountered along the way are compacted out at the end,
    /// under the collection lock.
    pub fn dispatch(&self, event: &dyn Event) -> DispatchOutcome {
        let event_type = event.as_any().type_id();
        let refs: Vec<HandlerRefSnapshot> = {
            let inner = self.inner.lock().unwrap();
            match inner.by_type.get(&event_type) {
                Some(bucket) => bucket
                    .iter()
                    .map(|r| HandlerRefSnapshot {
                        id: r.id(),
                        event_type_name: r.event_type_name(),
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut outcome = DispatchOutcome::default();
        if refs.is_empty() {
            self.compact(event_type);
            return outcome;
        }

        // Re-borrow the live refs one at a time so `dispatch` does not hold
        // the lock while a handler runs (handlers may add/remove subscribers
        // or enqueue further events).
        for snapshot in &refs {
            let delivered = self.with_ref(event_type, snapshot.id, |r| r.deliver(event));
            match delivered {
                Some(Ok(true)) => outcome.delivered += 1,
                Some(Ok(false)) => {}
                Some(Err(error)) => outcome.failures.push(HandlerFailure {
                    handler_ref_id: snapshot.id,
                    event_type_name: snapshot.event_type_name,
                    error,
                }),
                None => {}
            }
        }

        self.compact(event_type);
        outcome
    }

    /// Drops every handler ref and marks the collection closed; further
    /// `add`/`add_weak`/`add_all` calls become no-ops. Used when the owning
    /// queue reaches `Closed`.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.by_type.clear();
        inner.closed = true;
    }

    fn with_ref<R>(&self, event_type: TypeId, id: u64, f: impl FnOnce(&HandlerRef) -> R) -> Option<R> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_type
            .get(&event_type)
            .and_then(|bucket| bucket.iter().find(|r| r.id() == id))
            .map(f)
    }

    fn compact(&self, event_type: TypeId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(bucket) = inner.by_type.get_mut(&event_type) {
            bucket.retain(|r| !r.is_dead());
        }
    }
}

struct HandlerRefSnapshot {
    id: u64,
    event_type_name: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::source_site::SourceSiteCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct TestEvent {
        site: SourceSiteCell,
    }
    impl Event for TestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);
    impl Handler for CountingHandler {
        fn handle(&self, _event: &dyn Event) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;
    impl Handler for FailingHandler {
        fn handle(&self, _event: &dyn Event) -> Result<(), HandlerError> {
            Err(HandlerError::from_message("FailingHandler", "boom"))
        }
    }

    #[derive(Debug, Default)]
    struct OtherEvent {
        site: SourceSiteCell,
    }
    impl Event for OtherEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    /// Declares support for two event types via `accepted_event_types`,
    /// exercising `add_all`'s only polymorphic-discovery path.
    struct MultiTypeHandler(Arc<AtomicUsize>);
    impl Handler for MultiTypeHandler {
        fn handle(&self, _event: &dyn Event) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn accepted_event_types(&self) -> Vec<TypeId> {
            vec![TypeId::of::<TestEvent>(), TypeId::of::<OtherEvent>()]
        }
    }

    #[test]
    fn dispatch_delivers_to_matching_handlers_in_order() {
        let collection = SubscriberCollection::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler(counter.clone()));
        collection.add(handler, TypeId::of::<TestEvent>(), "TestEvent");

        let outcome = collection.dispatch(&TestEvent::default());
        assert_eq!(outcome.delivered, 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adding_same_handler_twice_is_a_no_op() {
        let collection = SubscriberCollection::new();
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        assert!(collection.add(Arc::clone(&handler), TypeId::of::<TestEvent>(), "TestEvent"));
        assert!(!collection.add(handler, TypeId::of::<TestEvent>(), "TestEvent"));
    }

    #[test]
    fn removing_never_added_handler_returns_false() {
        let collection = SubscriberCollection::new();
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        assert!(!collection.remove(&handler));
    }

    #[test]
    fn weak_ref_is_compacted_after_collection() {
        let collection = SubscriberCollection::new();
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        collection.add_weak(&handler, TypeId::of::<TestEvent>(), "TestEvent");
        drop(handler);

        let outcome = collection.dispatch(&TestEvent::default());
        assert_eq!(outcome.delivered, 0);

        let inner = collection.inner.lock().unwrap();
        assert!(inner.by_type.get(&TypeId::of::<TestEvent>()).unwrap().is_empty());
    }

    #[test]
    fn dispatch_captures_failures_and_continues() {
        let collection = SubscriberCollection::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let failing: Arc<dyn Handler> = Arc::new(FailingHandler);
        let counting: Arc<dyn Handler> = Arc::new(CountingHandler(counter.clone()));
        collection.add(failing, TypeId::of::<TestEvent>(), "TestEvent");
        collection.add(counting, TypeId::of::<TestEvent>(), "TestEvent");

        let outcome = collection.dispatch(&TestEvent::default());
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_clears_and_blocks_further_adds() {
        let collection = SubscriberCollection::new();
        collection.close();
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        assert!(!collection.add(handler, TypeId::of::<TestEvent>(), "TestEvent"));
    }

    #[test]
    fn add_all_registers_every_declared_event_type() {
        let collection = SubscriberCollection::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn Handler> = Arc::new(MultiTypeHandler(counter.clone()));

        let added = collection.add_all(handler, false, &["TestEvent", "OtherEvent"]);
        assert_eq!(added, 2);

        let outcome = collection.dispatch(&TestEvent::default());
        assert_eq!(outcome.delivered, 1);
        let outcome = collection.dispatch(&OtherEvent::default());
        assert_eq!(outcome.delivered, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn add_all_falls_back_to_unknown_name_when_names_run_short() {
        let collection = SubscriberCollection::new();
        let handler: Arc<dyn Handler> =
            Arc::new(MultiTypeHandler(Arc::new(AtomicUsize::new(0))));

        let added = collection.add_all(handler, false, &["TestEvent"]);
        assert_eq!(added, 2);

        let inner = collection.inner.lock().unwrap();
        let other_bucket = inner.by_type.get(&TypeId::of::<OtherEvent>()).unwrap();
        assert_eq!(other_bucket[0].event_type_name(), "<unknown>");
    }
}
