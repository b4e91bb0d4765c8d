//! The [`Event`] trait and the two standard event types the queue itself
//! produces: [`ShutdownEvent`] and [`UnhandledEventFailure`].
//!
//! Event "subtyping" (§9 REDESIGN FLAGS) is realized as capability methods
//! (`is_shutdown`, `is_critical`) on a shared trait rather than a class
//! hierarchy. Handler registration keys off the concrete Rust type
//! (`TypeId`, via `downcast_rs`), not a reflection-based assignability check.

use downcast_rs::{impl_downcast, DowncastSync};

use crate::source_site::{SourceSite, SourceSiteCell};

/// A value describing something that happened, carrying no behavior beyond
/// data plus a once-stamped enqueue source site.
///
/// Implementors own a [`SourceSiteCell`] and expose it via [`Event::site_cell`];
/// the default methods on this trait do the rest.
pub trait Event: DowncastSync + std::fmt::Debug {
    /// Returns the cell backing this event's source-site stamp.
    fn site_cell(&self) -> &SourceSiteCell;

    /// Marks this event for inline dispatch via `MainEventQueue::handle_critical`.
    fn is_critical(&self) -> bool {
        false
    }

    /// Marks this event as driving the queue's shutdown protocol.
    fn is_shutdown(&self) -> bool {
        false
    }

    /// The site this event was enqueued from, if it has been enqueued yet.
    fn source_site(&self) -> Option<SourceSite> {
        self.site_cell().get()
    }

    /// Stamps the enqueue source site. Returns `false` if already stamped.
    fn stamp_source_site(&self, site: SourceSite) -> bool {
        self.site_cell().try_stamp(site)
    }
}

impl_downcast!(sync Event);

/// The event whose handling drives the queue from `Open` towards `Closed`.
///
/// Enqueued like any other event; `EventStorage` gives it special treatment
/// (see [`crate::storage::EventStorage`]) so it always surfaces after every
/// regular event that was pending ahead of it.
#[derive(Debug, Default)]
pub struct ShutdownEvent {
    site: SourceSiteCell,
}

impl ShutdownEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for ShutdownEvent {
    fn site_cell(&self) -> &SourceSiteCell {
        &self.site
    }

    fn is_shutdown(&self) -> bool {
        true
    }
}

/// The standard "a handler raised an error" event.
///
/// Carries the same data whether it arose from the regular queue or from
/// `MainEventQueue::handle_critical`; the `critical` flag distinguishes the
/// two so the failure is routed back through the matching path (§4.5 step 8,
/// §4.6 operation 3).
#[derive(Debug)]
pub struct UnhandledEventFailure {
    site: SourceSiteCell,
    error_type: &'static str,
    message: String,
    formatted: String,
    critical: bool,
}

impl UnhandledEventFailure {
    pub fn new(
        error_type: &'static str,
        message: String,
        formatted: String,
        critical: bool,
    ) -> Self {
        Self {
            site: SourceSiteCell::new(),
            error_type,
            message,
            formatted,
            critical,
        }
    }

    pub fn error_type(&self) -> &'static str {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// A recursive, indented dump of the originating error's `source()` chain.
    pub fn formatted(&self) -> &str {
        &self.formatted
    }
}

impl Event for UnhandledEventFailure {
    fn site_cell(&self) -> &SourceSiteCell {
        &self.site
    }

    fn is_critical(&self) -> bool {
        self.critical
    }
}
