//! Client-cancellation signalling.
//!
//! The server attaches a [`CancelSignal`] to every request's extensions and
//! fires it when the connection stops waiting for the response. Handlers check
//! it with [`CancelSignal::of`] or await [`CancelSignal::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::handler::Request;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable, fire-once cancellation flag.
///
/// # Example
///
/// ```rust
/// use keel_core::CancelSignal;
///
/// let signal = CancelSignal::new();
/// let observer = signal.clone();
///
/// signal.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    /// Creates a signal that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Repeated calls are no-ops.
    pub fn cancel(&self) {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Completes when the signal fires, immediately if it already has.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Returns a guard that fires this signal when dropped unless disarmed.
    #[must_use]
    pub fn guard(&self) -> CancelGuard {
        CancelGuard {
            signal: Some(self.clone()),
        }
    }

    /// Attaches this signal to a request, replacing any previous one.
    pub fn attach(&self, req: &mut Request) {
        req.extensions_mut().insert(self.clone());
    }

    /// Returns the signal attached to `req`, if any.
    #[must_use]
    pub fn of(req: &Request) -> Option<&CancelSignal> {
        req.extensions().get::<CancelSignal>()
    }
}

/// Fires its [`CancelSignal`] on drop.
///
/// The server holds one inside the future hyper polls for a request; if hyper
/// drops that future because the client went away, the signal fires.
#[derive(Debug)]
pub struct CancelGuard {
    signal: Option<CancelSignal>,
}

impl CancelGuard {
    /// Consumes the guard without firing.
    pub fn disarm(mut self) {
        self.signal = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.cancel();
        }
    }
}
