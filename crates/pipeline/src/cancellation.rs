//! Shared cancellation signal.
//!
//! One [`CancellationSource`] is owned by the pipeline controller; every
//! dispatch loop, stage worker, and Reasoner call receives a cloned
//! [`CancellationToken`]. Firing the source is permanent.
//!
//! Dropping the source without firing it also counts as cancellation, so
//! tasks never outlive the controller that spawned them waiting on a signal
//! that can no longer arrive.

use std::sync::Arc;

use tokio::sync::watch;

/// The firing side of the cancellation signal.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    /// Creates an unfired signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.tx.subscribe(),
            _source: None,
        }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The observing side of the cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
    // Keeps the channel open for tokens that own their source.
    _source: Option<Arc<watch::Sender<bool>>>,
}

impl CancellationToken {
    /// A token whose source is already gone; it reports cancellation
    /// immediately. Useful for one-off calls outside a running processor.
    pub fn cancelled_token() -> Self {
        CancellationSource::new().token()
    }

    /// A token that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _source: Some(Arc::new(tx)),
        }
    }

    /// Returns `true` if the signal has fired or its source was dropped.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Completes once the signal fires or its source is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // An Err means the source was dropped, which is treated as cancelled.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}
