//! Cooperative cancellation for in-flight authentication attempts.
//!
//! A [`CancelHandle`] is kept by whoever may abort the attempt (a "Cancel" button,
//! a shutdown hook), and each attempt receives a [`CancelSignal`] derived from it.

use std::sync::Arc;
use tokio::sync::watch;

/// The sending side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    /// Creates a handle that has not been cancelled yet.
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self(Arc::new(sender))
    }

    /// Cancels every attempt observing a signal from this handle.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Returns a signal that resolves when this handle is cancelled.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.0.subscribe())
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self(receiver)
    }

    /// Resolves once the owning handle is cancelled. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
