//! Cancellation handles for relayed upstream calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Handle for cancelling an in-flight upstream call when the caller goes away.
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Clone)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
    /// Set once the relay finished normally, so a later drop is not a disconnect
    completed: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender,
            receiver,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the relay as completed normally.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Signal cancellation (only if not already completed).
    pub fn cancel(&self) {
        if !self.is_completed() {
            let _ = self.sender.send(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation has been signalled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Get a guard that cancels this handle when dropped.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            handle: self.clone(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its handle when dropped, unless the handle was marked completed.
///
/// Held by request handlers: if the client disconnects, the handler future is
/// dropped and any background work tied to the handle stops with it.
pub struct CancelOnDrop {
    handle: CancelHandle,
}

impl CancelOnDrop {
    pub fn handle(&self) -> &CancelHandle {
        &self.handle
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
