use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Completed frame ranges out of the total for one render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Frame ranges fully composed so far.
    pub completed_ranges: u64,
    /// Frame ranges in the render.
    pub total_ranges: u64,
}

impl ProgressEvent {
    /// Completion ratio in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        if self.total_ranges == 0 {
            return 1.0;
        }
        self.completed_ranges as f64 / self.total_ranges as f64
    }
}

/// Sending half of a progress channel.
///
/// Reporting never blocks. When the receiver is behind, the oldest undelivered event is dropped,
/// so the latest event (including the final one) is always delivered.
#[derive(Clone, Debug)]
pub struct ProgressSender {
    tx: Sender<ProgressEvent>,
    oldest: Receiver<ProgressEvent>,
}

impl ProgressSender {
    pub(crate) fn report(&self, event: ProgressEvent) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.oldest.try_recv();
                    event = back;
                }
            }
        }
    }
}

/// Bounded progress channel holding the newest `capacity` undelivered events.
///
/// The receiver iterates until every sender is dropped.
pub fn progress_channel(capacity: usize) -> (ProgressSender, Receiver<ProgressEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let sender = ProgressSender {
        tx,
        oldest: rx.clone(),
    };
    (sender, rx)
}

/// Shared cancellation flag, checked between frame ranges.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional progress reporting and cancellation for one render.
#[derive(Clone, Debug, Default)]
pub struct RenderControl {
    /// Progress destination.
    pub progress: Option<ProgressSender>,
    /// Cancellation flag.
    pub cancel: CancelToken,
}

impl RenderControl {
    /// No progress reporting, never cancelled unless `cancel` is triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress to `sender`.
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Use `token` for cancellation.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub(crate) fn report(&self, event: ProgressEvent) {
        if let Some(p) = &self.progress {
            p.report(event);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/progress.rs"]
mod tests;
