//! Run-wide cooperative cancellation.

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::info;

/// A token shared by every pipeline of one run.
///
/// The engine checks it between modules; long-running modules may check it
/// themselves or await [`CancellationToken::cancelled`]. Only the first
/// reason is kept.
#[derive(Debug, Default)]
pub struct CancellationToken {
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Later calls are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut current = self.reason.write();
            if current.is_some() {
                return;
            }
            let reason = reason.into();
            info!(reason = %reason, "Run cancellation requested");
            *current = Some(reason);
        }
        self.notify.notify_waiters();
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.read().is_some()
    }

    /// Returns the first cancellation reason.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
