//! Cross-task stop handshake.
//!
//! Lets a controller wind a worker loop down cleanly: the controller
//! raises the flag and waits, the worker polls it at its loop boundary
//! and acknowledges once it has released its resources (socket, decode
//! window). Used for orderly shutdown; routine station changes drop the
//! session future instead.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// One-shot stop request with completion handshake.
///
/// Lives in a `static`; `new` is const. One requester, one worker.
pub struct StopToken {
    requested: AtomicBool,
    done: Signal<CriticalSectionRawMutex, ()>,
}

impl StopToken {
    /// Create an idle token.
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            done: Signal::new(),
        }
    }

    /// Raise the stop flag without waiting.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// True once a stop has been requested.
    ///
    /// Polled by the worker at its loop boundary.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Worker side: report that the stop is complete.
    pub fn acknowledge(&self) {
        self.done.signal(());
    }

    /// Raise the stop flag and wait for the worker's acknowledgement.
    pub async fn stop(&self) {
        self.request();
        self.done.wait().await;
    }

    /// Reset for the next cycle. Call after [`StopToken::stop`] returns,
    /// before the worker is restarted.
    pub fn rearm(&self) {
        self.requested.store(false, Ordering::Release);
        self.done.reset();
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}
