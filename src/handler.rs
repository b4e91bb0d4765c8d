//! The [`Handler`] interface and the adapter handlers built on top of it
//! (§6, §9: stateless/stateful function wrappers and typed convenience
//! wrappers for the shutdown and failure events).

use std::any::TypeId;
use std::sync::Mutex;

use crate::error::HandlerError;
use crate::event::{Event, UnhandledEventFailure};

/// A callable bound to one or more event types, invoked by the queue.
pub trait Handler: Send + Sync {
    /// Handles one event. Propagating an error causes the queue to capture
    /// it as an `UnhandledEventFailure` rather than aborting dispatch.
    fn handle(&self, event: &dyn Event) -> Result<(), HandlerError>;

    /// The event types this handler accepts, used by `SubscriberCollection::add_all`.
    ///
    /// Defaults to empty; handlers registered with `add`/`add_typed` against
    /// a single explicit type do not need to implement this.
    fn accepted_event_types(&self) -> Vec<TypeId> {
        Vec::new()
    }
}

/// Wraps a plain closure over a concrete event type as a [`Handler`].
///
/// The closure receives the already-downcast concrete event; a mismatched
/// dispatch (which should never happen, since `HandlerRef::matches` filters
/// by `TypeId` before calling `deliver`) is reported as a `HandlerError`
/// rather than panicking.
pub struct FnHandler<E, F> {
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> Handler for FnHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &dyn Event) -> Result<(), HandlerError> {
        match event.as_any().downcast_ref::<E>() {
            Some(concrete) => (self.f)(concrete),
            None => Err(HandlerError::from_message(
                "eventqueue::FnHandler",
                "dispatched event did not match the handler's declared type",
            )),
        }
    }

    fn accepted_event_types(&self) -> Vec<TypeId> {
        vec![TypeId::of::<E>()]
    }
}

/// Wraps a `(state, event) -> state` closure as a [`Handler`], serializing
/// calls under an internal lock so each state transition is atomic.
pub struct StatefulHandler<E, S, F> {
    state: Mutex<S>,
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, S, F> StatefulHandler<E, S, F>
where
    E: Event,
    S: Send,
    F: Fn(&mut S, &E) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(initial: S, f: F) -> Self {
        Self {
            state: Mutex::new(initial),
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, S, F> Handler for StatefulHandler<E, S, F>
where
    E: Event,
    S: Send,
    F: Fn(&mut S, &E) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &dyn Event) -> Result<(), HandlerError> {
        match event.as_any().downcast_ref::<E>() {
            Some(concrete) => {
                let mut state = self.state.lock().unwrap();
                (self.f)(&mut state, concrete)
            }
            None => Err(HandlerError::from_message(
                "eventqueue::StatefulHandler",
                "dispatched event did not match the handler's declared type",
            )),
        }
    }

    fn accepted_event_types(&self) -> Vec<TypeId> {
        vec![TypeId::of::<E>()]
    }
}

/// Convenience constructor for a handler of `ShutdownEvent` alone, built from
/// a zero-argument closure.
pub fn on_shutdown<F>(f: F) -> FnHandler<crate::event::ShutdownEvent, impl Fn(&crate::event::ShutdownEvent) -> Result<(), HandlerError> + Send + Sync>
where
    F: Fn() + Send + Sync,
{
    FnHandler::new(move |_: &crate::event::ShutdownEvent| {
        f();
        Ok(())
    })
}

/// Convenience constructor for a handler of [`UnhandledEventFailure`] alone.
pub fn on_unhandled_failure<F>(
    f: F,
) -> FnHandler<UnhandledEventFailure, impl Fn(&UnhandledEventFailure) -> Result<(), HandlerError> + Send + Sync>
where
    F: Fn(&UnhandledEventFailure) + Send + Sync,
{
    FnHandler::new(move |event: &UnhandledEventFailure| {
        f(event);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_site::SourceSiteCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct TestEvent {
        site: SourceSiteCell,
    }
    impl Event for TestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    #[test]
    fn fn_handler_downcasts_and_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let handler = FnHandler::new(move |_: &TestEvent| {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let event = TestEvent::default();
        handler.handle(&event).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stateful_handler_serializes_state() {
        let handler = StatefulHandler::new(0u32, |state: &mut u32, _: &TestEvent| {
            *state += 1;
            Ok(())
        });
        let event = TestEvent::default();
        handler.handle(&event).unwrap();
        handler.handle(&event).unwrap();
        assert_eq!(*handler.state.lock().unwrap(), 2);
    }
}
