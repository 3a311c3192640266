//! # Cancellation context with an attached cause.
//!
//! [`Ctx`] is the value threaded through every user callback and internal
//! phase. It is a [`CancellationToken`] plus two things a bare token does not
//! carry:
//!
//! - a write-once **cause** explaining *why* the context was cancelled
//!   (a deadline, an explicit stop reason, or plain cancellation);
//! - a parent link, so a context derived from another is cancelled whenever
//!   its parent is, and reports the parent's cause when the parent fired
//!   first.
//!
//! Deadlines are attached at derivation time via
//! [`Ctx::child_with_timeout`]: a timer task cancels the child with a
//! [`LifecycleError::Timeout`] cause tagged by the deadline's
//! [`TimeoutSource`], so callers can tell *which* timeout fired.
//!
//! A cause is only recorded while the token is still uncancelled; whichever
//! event lands first (parent cancellation, deadline, explicit cancel) owns
//! the cause. Later events are no-ops.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{LifecycleError, TimeoutSource};

/// Cancellation scope handed to user callbacks and internal phases.
///
/// Cheap to clone; all clones observe the same cancellation state and cause.
///
/// # Example
/// ```
/// use appvisor::{Ctx, LifecycleError};
///
/// let ctx = Ctx::new();
/// assert!(!ctx.is_cancelled());
///
/// ctx.cancel(Some(LifecycleError::fail("operator asked")));
/// assert!(ctx.is_cancelled());
/// assert_eq!(ctx.cause(), LifecycleError::fail("operator asked"));
/// ```
#[derive(Clone)]
pub struct Ctx {
    shared: Arc<CtxShared>,
}

struct CtxShared {
    token: CancellationToken,
    cause: OnceLock<LifecycleError>,
    parent: Option<Arc<CtxShared>>,
}

impl Drop for CtxShared {
    fn drop(&mut self) {
        // Last handle gone: release anything parked on this scope (deadline
        // timers, leaked callback tasks).
        self.token.cancel();
    }
}

impl Ctx {
    /// Creates a root context.
    pub fn new() -> Self {
        Ctx {
            shared: Arc::new(CtxShared {
                token: CancellationToken::new(),
                cause: OnceLock::new(),
                parent: None,
            }),
        }
    }

    /// True once this context (or an ancestor) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Completes when this context (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.shared.token.cancelled().await;
    }

    /// Cancels this context and everything derived from it.
    ///
    /// Idempotent: only the first cancellation event records a cause. Passing
    /// `None` leaves the cause as [`LifecycleError::Canceled`].
    pub fn cancel(&self, cause: Option<LifecycleError>) {
        if self.shared.token.is_cancelled() {
            return;
        }
        if let Some(cause) = cause {
            let _ = self.shared.cause.set(cause);
        }
        self.shared.token.cancel();
    }

    /// The error explaining why this context was cancelled.
    ///
    /// Own cause first, then the nearest ancestor's; a context cancelled
    /// without an explicit cause reports [`LifecycleError::Canceled`].
    pub fn cause(&self) -> LifecycleError {
        let mut cur = Some(&self.shared);
        while let Some(shared) = cur {
            if let Some(cause) = shared.cause.get() {
                return cause.clone();
            }
            cur = shared.parent.as_ref();
        }
        LifecycleError::Canceled
    }

    /// Derives a child context cancelled whenever `self` is.
    pub fn child(&self) -> Ctx {
        Ctx {
            shared: Arc::new(CtxShared {
                token: self.shared.token.child_token(),
                cause: OnceLock::new(),
                parent: Some(Arc::clone(&self.shared)),
            }),
        }
    }

    /// Derives a child with a deadline.
    ///
    /// If the deadline fires before anything else cancels the child, the
    /// child's cause becomes `Timeout(source)`. The sentinel
    /// [`NO_TIMEOUT`](crate::NO_TIMEOUT) is an ordinary (very distant)
    /// deadline, not a special case.
    pub fn child_with_timeout(&self, timeout: Duration, source: TimeoutSource) -> Ctx {
        let child = self.child();
        let shared = Arc::clone(&child.shared);
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(timeout) => {
                    if !shared.token.is_cancelled() {
                        let _ = shared.cause.set(LifecycleError::Timeout(source));
                        shared.token.cancel();
                    }
                }
                _ = shared.token.cancelled() => {}
            }
        });
        child
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Ctx::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_records_first_cause_only() {
        let ctx = Ctx::new();
        ctx.cancel(Some(LifecycleError::fail("first")));
        ctx.cancel(Some(LifecycleError::fail("second")));
        assert_eq!(ctx.cause(), LifecycleError::fail("first"));
    }

    #[tokio::test]
    async fn cancel_without_cause_reports_canceled() {
        let ctx = Ctx::new();
        ctx.cancel(None);
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cause(), LifecycleError::Canceled);
    }

    #[tokio::test]
    async fn child_inherits_parent_cancellation_and_cause() {
        let parent = Ctx::new();
        let child = parent.child();

        parent.cancel(Some(LifecycleError::fail("parent died")));
        child.cancelled().await;
        assert_eq!(child.cause(), LifecycleError::fail("parent died"));
    }

    #[tokio::test]
    async fn child_cancel_does_not_touch_parent() {
        let parent = Ctx::new();
        let child = parent.child();

        child.cancel(Some(LifecycleError::fail("local")));
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert_eq!(child.cause(), LifecycleError::fail("local"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_child_reports_tagged_timeout() {
        let parent = Ctx::new();
        let child =
            parent.child_with_timeout(Duration::from_secs(3), TimeoutSource::CheckReadyCall);

        child.cancelled().await;
        assert_eq!(
            child.cause(),
            LifecycleError::Timeout(TimeoutSource::CheckReadyCall)
        );
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cause_beats_a_later_deadline() {
        let parent = Ctx::new();
        let child =
            parent.child_with_timeout(Duration::from_secs(60), TimeoutSource::ShutdownCall);

        tokio::spawn({
            let parent = parent.clone();
            async move {
                time::sleep(Duration::from_secs(1)).await;
                parent.cancel(Some(LifecycleError::fail("stop requested")));
            }
        });

        child.cancelled().await;
        assert_eq!(child.cause(), LifecycleError::fail("stop requested"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_already_fired_wins_over_later_parent_cancel() {
        let parent = Ctx::new();
        let child =
            parent.child_with_timeout(Duration::from_secs(1), TimeoutSource::StartStopStop);

        child.cancelled().await;
        parent.cancel(Some(LifecycleError::fail("too late")));
        assert_eq!(
            child.cause(),
            LifecycleError::Timeout(TimeoutSource::StartStopStop)
        );
    }
}
