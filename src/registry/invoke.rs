//! Deadline and cancellation controls for channel invocation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that stops an in-flight invoke before its next subscriber.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Token that is not cancelled yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Options for [`EventRegistry::invoke_with`](super::EventRegistry::invoke_with).
///
/// Both checks run between subscriber calls; a subscriber that is already
/// running is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl InvokeOptions {
    /// No deadline, no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop before the next subscriber once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now. A timeout too large to represent leaves
    /// the options without a deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Stop before the next subscriber once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configured deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_never_stop() {
        let opts = InvokeOptions::new();
        assert!(!opts.is_cancelled());
        assert!(!opts.is_expired());
    }

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancellationToken::new();
        let opts = InvokeOptions::new().with_cancellation(token.clone());
        assert!(!opts.is_cancelled());
        token.cancel();
        assert!(opts.is_cancelled());
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let opts = InvokeOptions::new().with_deadline(Instant::now());
        assert!(opts.is_expired());
        let opts = InvokeOptions::new().with_timeout(Duration::from_secs(60));
        assert!(!opts.is_expired());
    }

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        let opts = InvokeOptions::new().with_timeout(Duration::MAX);
        assert!(opts.deadline().is_none());
        assert!(!opts.is_expired());
    }
}
