//! The reference-counted suspension gate (§4.1).

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Notifier = Arc<dyn Fn() + Send + Sync>;

/// A reference-counted enable/disable gate.
///
/// `count == 0` means enabled. `suspend`/`resume` are not required to
/// balance: extra resumes are silently absorbed so independent callers can
/// each suspend and resume without coordinating with one another.
pub struct Suspender {
    count: AtomicUsize,
    on_suspend: Mutex<Option<Notifier>>,
    on_resume: Mutex<Option<Notifier>>,
}

impl fmt::Debug for Suspender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspender")
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Suspender {
    fn default() -> Self {
        Self::new()
    }
}

impl Suspender {
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            on_suspend: Mutex::new(None),
            on_resume: Mutex::new(None),
        }
    }

    /// Installs a callback invoked on the 0→1 `suspend()` transition.
    ///
    /// Run after the increment has committed and without holding any
    /// internal lock, so the notifier may re-enter this `Suspender` safely.
    pub fn on_suspend(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.on_suspend.lock().unwrap() = Some(Arc::new(f));
    }

    /// Installs a callback invoked on the 1→0 `resume()` transition.
    pub fn on_resume(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.on_resume.lock().unwrap() = Some(Arc::new(f));
    }

    pub fn suspend(&self) {
        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        if prev == 0 {
            self.notify(&self.on_suspend);
        }
    }

    /// Decrements the count if positive; floors at zero. No-op (besides the
    /// floor) if already enabled.
    pub fn resume(&self) {
        loop {
            let cur = self.count.load(Ordering::Acquire);
            if cur == 0 {
                return;
            }
            if self
                .count
                .compare_exchange(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if cur == 1 {
                    self.notify(&self.on_resume);
                }
                return;
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    pub fn is_suspended(&self) -> bool {
        !self.is_enabled()
    }

    /// Suspends for the lifetime of the returned guard, resuming on drop
    /// (including during unwinding). Used by `MainEventQueue::handle_critical`
    /// for scoped delivery suspension.
    pub fn suspend_scoped(&self) -> SuspendGuard<'_> {
        self.suspend();
        SuspendGuard { suspender: self }
    }

    fn notify(&self, slot: &Mutex<Option<Notifier>>) {
        let cb = slot.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb();
        }
    }
}

/// RAII guard returned by [`Suspender::suspend_scoped`]; resumes on drop.
pub struct SuspendGuard<'a> {
    suspender: &'a Suspender,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.suspender.resume();
    }
}
