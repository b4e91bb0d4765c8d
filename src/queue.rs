//! The core event queue state machine (§4.5).

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::error::HandlerFailure;
use crate::event::{Event, UnhandledEventFailure};
use crate::source_site::SourceSite;
use crate::storage::EventStorage;
use crate::subscribers::SubscriberCollection;
use crate::suspender::Suspender;

/// The result of a single [`EventQueue::handle_next`] call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandleResult {
    /// Nothing was delivered: storage was empty, delivery is suspended, or
    /// this thread is already inside a `handle_next` call for this queue.
    Idle,
    /// One regular event was popped and dispatched.
    Delivered,
    /// The popped event was a `ShutdownEvent`, and was dispatched.
    ShuttingDown,
    /// The queue has already fully closed.
    Closed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
enum State {
    Open = 0,
    Closing = 1,
    Drained = 2,
    Closed = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => State::Open,
            1 => State::Closing,
            2 => State::Drained,
            _ => State::Closed,
        }
    }
}

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_QUEUES: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

/// Guards against a handler re-entering `handle_next` on the same queue from
/// the same thread; removes itself from the active set on drop (including
/// during unwinding).
struct ReentrancyGuard {
    queue_id: u64,
}

impl ReentrancyGuard {
    fn enter(queue_id: u64) -> Option<Self> {
        let already_active = ACTIVE_QUEUES.with(|set| !set.borrow_mut().insert(queue_id));
        if already_active {
            None
        } else {
            Some(Self { queue_id })
        }
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        ACTIVE_QUEUES.with(|set| {
            set.borrow_mut().remove(&self.queue_id);
        });
    }
}

/// Combines [`EventStorage`], [`SubscriberCollection`], and the two
/// suspenders (intake, delivery) into the core state machine.
pub struct EventQueue {
    id: u64,
    state: AtomicU8,
    storage: EventStorage,
    subscribers: SubscriberCollection,
    intake_suspender: Suspender,
    delivery_suspender: Suspender,
    intake_permanently_suspended: std::sync::atomic::AtomicBool,
    in_flight: AtomicUsize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            state: AtomicU8::new(State::Open as u8),
            storage: EventStorage::new(),
            subscribers: SubscriberCollection::new(),
            intake_suspender: Suspender::new(),
            delivery_suspender: Suspender::new(),
            intake_permanently_suspended: std::sync::atomic::AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn subscribers(&self) -> &SubscriberCollection {
        &self.subscribers
    }

    pub fn intake_suspender(&self) -> &Suspender {
        &self.intake_suspender
    }

    pub fn delivery_suspender(&self) -> &Suspender {
        &self.delivery_suspender
    }

    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Monotonically raises the state to at least `new_state`.
    fn raise_state(&self, new_state: State) {
        self.state.fetch_max(new_state as u8, Ordering::AcqRel);
    }

    /// Submits `event`. Drops it silently (returning `false`) if the queue is
    /// closed or intake is suspended.
    ///
    /// Intake is suspended permanently in the same step that moves the state
    /// to `Closing`, so checking the suspender alone covers the base spec's
    /// separate "state is Closing" branch; see DESIGN.md.
    pub fn enqueue(&self, event: Arc<dyn Event>, site: SourceSite) -> bool {
        if self.state() == State::Closed {
            debug!("queue {} closed, dropping enqueue from {}", self.id, site);
            return false;
        }
        if self.intake_suspender.is_suspended() {
            debug!("queue {} intake suspended, dropping enqueue from {}", self.id, site);
            return false;
        }
        event.stamp_source_site(site);
        self.storage.try_push(event)
    }

    /// True iff the queue has fully closed and no dispatch is in flight.
    pub fn is_shut_down(&self) -> bool {
        self.state() == State::Closed && self.in_flight.load(Ordering::Acquire) == 0
    }

    /// Pops and dispatches at most one pending event.
    pub fn handle_next(&self) -> HandleResult {
        if self.state() == State::Closed {
            return HandleResult::Closed;
        }
        if self.delivery_suspender.is_suspended() {
            return HandleResult::Idle;
        }
        let _guard = match ReentrancyGuard::enter(self.id) {
            Some(guard) => guard,
            None => {
                warn!("queue {} handle_next called re-entrantly, returning Idle", self.id);
                return HandleResult::Idle;
            }
        };

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = self.handle_next_inner();
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        result
    }

    fn handle_next_inner(&self) -> HandleResult {
        let event = match self.storage.try_pop() {
            Some(event) => event,
            None => return HandleResult::Idle,
        };

        let is_shutdown = event.is_shutdown();
        if is_shutdown {
            debug!("queue {} handling shutdown event", self.id);
            self.raise_state(State::Closing);
            self.suspend_intake_permanently();
        }

        let outcome = self.subscribers.dispatch(event.as_ref());
        let is_failure_event = event.as_any().downcast_ref::<UnhandledEventFailure>().is_some();
        self.report_failures(is_failure_event, outcome.failures);

        if is_shutdown {
            if self.storage.is_empty() {
                self.raise_state(State::Drained);
                self.subscribers.close();
                self.raise_state(State::Closed);
                debug!("queue {} closed", self.id);
            }
            HandleResult::ShuttingDown
        } else {
            HandleResult::Delivered
        }
    }

    fn suspend_intake_permanently(&self) {
        if !self.intake_permanently_suspended.swap(true, Ordering::AcqRel) {
            self.intake_suspender.suspend();
        }
    }

    /// Wraps each dispatch failure as an `UnhandledEventFailure` and
    /// re-enqueues it, except that a failure raised while handling an
    /// `UnhandledEventFailure` is only logged, to prevent an infinite
    /// cascade (§7).
    fn report_failures(&self, originating_event_was_failure: bool, failures: Vec<HandlerFailure>) {
        for failure in failures {
            error!("{failure}");
            if originating_event_was_failure {
                warn!(
                    "swallowing failure from a handler of UnhandledEventFailure to avoid an infinite cascade: {failure}"
                );
                continue;
            }
            let event: Arc<dyn Event> = Arc::new(UnhandledEventFailure::new(
                failure.error.type_name(),
                failure.error.to_string(),
                failure.error.format_chain(),
                false,
            ));
            self.enqueue(event, SourceSite::new(file!(), "EventQueue::report_failures", line!()));
        }
    }
}
