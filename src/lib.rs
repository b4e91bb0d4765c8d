//! A thread-safe, in-process event dispatch library.
//!
//! Publishers submit event objects to an [`EventQueue`]; subscribers register
//! [`Handler`]s, held either strongly or weakly, against a concrete event
//! type. Events are delivered in FIFO order by repeatedly calling
//! [`EventQueue::handle_next`] from one or more worker threads. [`MainEventQueue`]
//! layers a second, "critical" priority on top: critical events are
//! dispatched synchronously on the calling thread, suspending regular
//! delivery for their duration.
//!
//! # Key Features
//!
//! - **Weak or strong retention**: subscribe with an owning `Arc` or a
//!   `Weak` back-reference; dead weak refs are compacted out lazily.
//! - **Suspendable intake and delivery**: reference-counted gates
//!   ([`Suspender`]) that independent callers can each engage without
//!   coordinating with one another.
//! - **Two-priority dispatch**: regular events queue and drain via
//!   `handle_next`; critical events ([`Event::is_critical`]) bypass the
//!   queue entirely via [`MainEventQueue::handle_critical`].
//! - **Orderly shutdown**: a [`ShutdownEvent`] flows through the queue like
//!   any other event, draining everything enqueued ahead of it before the
//!   queue transitions to closed.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use eventqueue::{EventQueue, Handler, HandlerError, Event};
//! use eventqueue::source_site::{SourceSite, SourceSiteCell};
//!
//! #[derive(Debug, Default)]
//! struct Ping {
//!     site: SourceSiteCell,
//! }
//! impl Event for Ping {
//!     fn site_cell(&self) -> &SourceSiteCell {
//!         &self.site
//!     }
//! }
//!
//! struct PrintPing;
//! impl Handler for PrintPing {
//!     fn handle(&self, _event: &dyn Event) -> Result<(), HandlerError> {
//!         println!("ping!");
//!         Ok(())
//!     }
//! }
//!
//! let queue = EventQueue::new();
//! queue.subscribers().add(
//!     Arc::new(PrintPing),
//!     std::any::TypeId::of::<Ping>(),
//!     "Ping",
//! );
//! queue.enqueue(Arc::new(Ping::default()), SourceSite::caller("main"));
//! queue.handle_next();
//! ```

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod error;
pub mod event;
pub mod handler;
pub mod handler_ref;
mod main_queue;
#[cfg(feature = "mock")]
pub mod mock;
mod queue;
pub mod source_site;
pub mod storage;
pub mod subscribers;
pub mod suspender;

pub use crate::error::{EventQueueError, HandlerError, HandlerFailure};
pub use crate::event::{Event, ShutdownEvent, UnhandledEventFailure};
pub use crate::handler::{on_shutdown, on_unhandled_failure, FnHandler, Handler, StatefulHandler};
pub use crate::handler_ref::{HandlerRef, TargetEquality};
pub use crate::main_queue::MainEventQueue;
#[cfg(feature = "mock")]
pub use crate::mock::MockHandler;
pub use crate::queue::{EventQueue, HandleResult};
pub use crate::source_site::SourceSite;
pub use crate::storage::EventStorage;
pub use crate::subscribers::{DispatchOutcome, SubscriberCollection};
pub use crate::suspender::{SuspendGuard, Suspender};
