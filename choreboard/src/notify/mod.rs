//! Outbound notification boundary.
//!
//! Notifications are fire-and-forget: a failed send is logged and never
//! rolls back the state transition that triggered it.

use parking_lot::Mutex;

use choreboard_model::MemberId;

/// Delivers a message to a member. Returns `true` on success; the core
/// only ever logs the result.
pub trait NotificationSink: Send + Sync {
    /// Attempts to deliver `message` to `recipient`.
    fn notify(&self, recipient: &MemberId, message: &str) -> bool;
}

/// Sends a notification, logging (and otherwise ignoring) failure.
pub fn send_best_effort<N: NotificationSink>(sink: &N, recipient: &MemberId, message: &str) {
    if !sink.notify(recipient, message) {
        tracing::warn!(recipient = %recipient, "notification delivery failed");
    }
}

/// Sink that drops every notification. Useful when no delivery channel is
/// wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _recipient: &MemberId, _message: &str) -> bool {
        true
    }
}

/// Sink that records every notification; used in tests to assert on what
/// was (attempted to be) delivered.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(MemberId, String)>>,
    /// When `true`, every send reports failure.
    pub fail: bool,
}

impl RecordingSink {
    /// Creates a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink where every delivery fails (but is still recorded).
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages recorded so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<(MemberId, String)> {
        self.sent.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, recipient: &MemberId, message: &str) -> bool {
        self.sent
            .lock()
            .push((recipient.clone(), message.to_string()));
        !self.fail
    }
}
