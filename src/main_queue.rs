//! The priority composite layering critical-event handling over a regular
//! [`EventQueue`] (§4.6).

use std::sync::Arc;

use log::{error, warn};

use crate::error::EventQueueError;
use crate::event::{Event, ShutdownEvent, UnhandledEventFailure};
use crate::queue::EventQueue;
use crate::source_site::SourceSite;
use crate::subscribers::SubscriberCollection;
use crate::suspender::Suspender;

const REGULAR: &str = "regular";
const CRITICAL: &str = "critical";

/// Wraps an [`EventQueue`], partitioning events into "regular" (queued,
/// delivered via `handle_next`) and "critical" (dispatched inline,
/// synchronously, on the calling thread).
pub struct MainEventQueue {
    inner: EventQueue,
}

impl Default for MainEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainEventQueue {
    pub fn new() -> Self {
        Self {
            inner: EventQueue::new(),
        }
    }

    /// Exposes the wrapped regular queue, for callers that need direct access
    /// to `handle_next`, the suspenders, or the raw `enqueue`.
    pub fn inner(&self) -> &EventQueue {
        &self.inner
    }

    pub fn subscribers(&self) -> &SubscriberCollection {
        self.inner.subscribers()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    /// Submits a non-critical event to the inner queue.
    ///
    /// # Errors
    ///
    /// Returns [`EventQueueError::InvalidEventCategory`] if `event` is tagged
    /// critical.
    pub fn enqueue_regular(
        &self,
        event: Arc<dyn Event>,
        site: SourceSite,
    ) -> Result<bool, EventQueueError> {
        if event.is_critical() {
            return Err(EventQueueError::InvalidEventCategory {
                expected: REGULAR,
                found: CRITICAL,
            });
        }
        Ok(self.inner.enqueue(event, site))
    }

    /// Dispatches a critical event synchronously on the calling thread,
    /// suspending the inner queue's delivery side for the duration.
    ///
    /// # Errors
    ///
    /// Returns [`EventQueueError::InvalidEventCategory`] if `event` is not
    /// tagged critical.
    pub fn handle_critical(&self, event: Arc<dyn Event>) -> Result<(), EventQueueError> {
        if !event.is_critical() {
            return Err(EventQueueError::InvalidEventCategory {
                expected: CRITICAL,
                found: REGULAR,
            });
        }
        self.handle_critical_inner(event.as_ref(), false);
        Ok(())
    }

    fn handle_critical_inner(&self, event: &dyn Event, is_failure_event: bool) {
        let _guard = self.inner.delivery_suspender().suspend_scoped();
        let outcome = self.inner.subscribers().dispatch(event);

        for failure in outcome.failures {
            error!("{failure}");
            if is_failure_event {
                warn!(
                    "swallowing failure from a handler of a critical UnhandledEventFailure to avoid an infinite cascade: {failure}"
                );
                continue;
            }
            let failure_event = UnhandledEventFailure::new(
                failure.error.type_name(),
                failure.error.to_string(),
                failure.error.format_chain(),
                true,
            );
            self.handle_critical_inner(&failure_event, true);
        }
    }

    /// Builds and submits a `ShutdownEvent` through the regular queue.
    ///
    /// Naturally idempotent: `EventStorage` already rejects a second pending
    /// `ShutdownEvent`, so a second call is a no-op.
    pub fn request_shutdown(&self, site: SourceSite) -> bool {
        self.inner
            .enqueue(Arc::new(ShutdownEvent::new()), site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::Handler;
    use crate::queue::HandleResult;
    use crate::source_site::SourceSiteCell;
    use std::any::TypeId;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct TestEvent {
        site: SourceSiteCell,
    }
    impl Event for TestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    #[derive(Debug, Default)]
    struct CriticalTestEvent {
        site: SourceSiteCell,
    }
    impl Event for CriticalTestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
        fn is_critical(&self) -> bool {
            true
        }
    }

    fn here() -> SourceSite {
        SourceSite::new(file!(), "test", line!())
    }

    #[test]
    fn critical_bypasses_regular_queue_and_suspends_delivery() {
        let queue = Arc::new(MainEventQueue::new());
        let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        struct RecordingHandler {
            order: Arc<Mutex<Vec<&'static str>>>,
            queue: Arc<MainEventQueue>,
        }
        impl Handler for RecordingHandler {
            fn handle(&self, event: &dyn Event) -> Result<(), HandlerError> {
                if event.as_any().downcast_ref::<CriticalTestEvent>().is_some() {
                    assert!(self.queue.inner().delivery_suspender().is_suspended());
                    self.order.lock().unwrap().push("critical");
                } else {
                    self.order.lock().unwrap().push("regular");
                }
                Ok(())
            }
        }

        let handler = Arc::new(RecordingHandler {
            order: order.clone(),
            queue: queue.clone(),
        });
        queue
            .subscribers()
            .add(handler.clone(), TypeId::of::<TestEvent>(), "TestEvent");
        queue.subscribers().add(
            handler,
            TypeId::of::<CriticalTestEvent>(),
            "CriticalTestEvent",
        );

        queue
            .enqueue_regular(Arc::new(TestEvent::default()), here())
            .unwrap();
        queue
            .handle_critical(Arc::new(CriticalTestEvent::default()))
            .unwrap();
        assert_eq!(queue.inner().handle_next(), HandleResult::Delivered);

        assert_eq!(*order.lock().unwrap(), vec!["critical", "regular"]);
    }

    #[test]
    fn category_guard_rejects_mismatched_events() {
        let queue = MainEventQueue::new();
        let err = queue
            .enqueue_regular(Arc::new(CriticalTestEvent::default()), here())
            .unwrap_err();
        assert!(matches!(err, EventQueueError::InvalidEventCategory { .. }));

        let err = queue.handle_critical(Arc::new(TestEvent::default())).unwrap_err();
        assert!(matches!(err, EventQueueError::InvalidEventCategory { .. }));
    }

    #[test]
    fn request_shutdown_is_idempotent() {
        let queue = MainEventQueue::new();
        assert!(queue.request_shutdown(here()));
        assert!(!queue.request_shutdown(here()));
    }
}
