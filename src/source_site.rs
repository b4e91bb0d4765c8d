//! Opaque source-position capture for enqueued events.
//!
//! The core queue never inspects call stacks itself; it only ever receives an
//! already-built [`SourceSite`]. Capturing *where* an event was produced is
//! treated as a thin, external concern (see the crate-level docs), and
//! [`SourceSite::caller`] is the one convenience the core offers for it.

use std::fmt;
use std::sync::OnceLock;

/// A free-form, opaque description of where an event was enqueued from.
///
/// `member` is typically a function or method name; it is not validated or
/// parsed by anything in this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SourceSite {
    pub file: &'static str,
    pub member: &'static str,
    pub line: u32,
}

impl SourceSite {
    pub const fn new(file: &'static str, member: &'static str, line: u32) -> Self {
        Self { file, member, line }
    }

    /// Captures the call site of the caller of this function.
    ///
    /// `member` is free-form; callers that want the enclosing function name
    /// typically pass it explicitly, since Rust has no stable `fn!()` macro.
    #[track_caller]
    pub fn caller(member: &'static str) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            member,
            line: loc.line(),
        }
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.file, self.line, self.member)
    }
}

/// Write-once cell backing `Event::source_site` / `Event::stamp_source_site`.
///
/// Every concrete event type embeds one of these and forwards the two
/// [`crate::event::Event`] trait methods to it. A `OnceLock` gives us "set
/// exactly once, atomically readable" for free, without a full mutex.
#[derive(Default)]
pub struct SourceSiteCell(OnceLock<SourceSite>);

impl SourceSiteCell {
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Attempts to stamp the site. Returns `false` if it was already stamped.
    pub fn try_stamp(&self, site: SourceSite) -> bool {
        self.0.set(site).is_ok()
    }

    pub fn get(&self) -> Option<SourceSite> {
        self.0.get().copied()
    }
}

impl fmt::Debug for SourceSiteCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(site) => write!(f, "{site:?}"),
            None => write!(f, "<unstamped>"),
        }
    }
}
