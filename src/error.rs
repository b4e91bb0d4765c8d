//! Error taxonomy (§7 of the design).
//!
//! `InvalidEventCategory` is raised immediately to the caller. A handler's
//! own error is never propagated to the caller of
//! `handle_next`/`handle_critical`; it is captured as a [`HandlerFailure`]
//! and folded into an `UnhandledEventFailure` event instead (see
//! [`crate::event::UnhandledEventFailure`]). The base spec's taxonomy also
//! names `NullArgument` and `QueueClosed`; neither has a reachable call site
//! in this rendition (see DESIGN.md's Open Questions), so they are omitted
//! rather than carried as dead variants.

use std::error::Error as StdError;
use std::fmt;

/// Programming-error conditions surfaced directly to callers.
#[derive(Debug, thiserror::Error)]
pub enum EventQueueError {
    #[error("event does not belong to the expected category ({expected}): {found}")]
    InvalidEventCategory {
        expected: &'static str,
        found: &'static str,
    },
}

/// An error raised by a [`crate::handler::Handler::handle`] implementation.
///
/// Captures the concrete error's type name (for diagnostics and for the
/// `UnhandledEventFailure` event) alongside the boxed error itself, so its
/// `source()` chain can still be walked.
pub struct HandlerError {
    type_name: &'static str,
    inner: Box<dyn StdError + Send + Sync + 'static>,
}

impl HandlerError {
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<E>(),
            inner: Box::new(err),
        }
    }

    pub fn from_message(type_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            type_name,
            inner: Box::new(MessageError(message.into())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recursively formats this error and its `source()` chain, one level of
    /// indentation per link, mirroring the "formatted full text" the base
    /// spec asks for.
    pub fn format_chain(&self) -> String {
        let mut out = String::new();
        let mut indent = 0usize;
        let mut cur: Option<&(dyn StdError + 'static)> = Some(self.inner.as_ref());
        while let Some(err) = cur {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&err.to_string());
            out.push('\n');
            cur = err.source();
            indent += 1;
        }
        out
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("type_name", &self.type_name)
            .field("message", &self.inner.to_string())
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.inner)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

/// A [`HandlerError`] paired with the identity of the `HandlerRef` that
/// produced it, as returned by `SubscriberCollection::dispatch`.
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler_ref_id: u64,
    pub event_type_name: &'static str,
    pub error: HandlerError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler #{} failed while processing {}: {}",
            self.handler_ref_id, self.event_type_name, self.error
        )
    }
}

impl StdError for HandlerFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}
