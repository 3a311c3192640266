//! # Timed asynchronous call primitive.
//!
//! [`async_call`] runs a user function on its own task with a per-call
//! deadline, a small grace window, and full parent-cancellation propagation.
//!
//! ```text
//!   parent Ctx ──child_with_timeout──► call Ctx
//!                                         │
//!                              spawned ──►f(ctx)──► oneshot slot
//!                                         │
//!          outcome ◄── race { slot, call Ctx cancelled (+ grace) }
//! ```
//!
//! The grace window exists because user functions frequently observe
//! cancellation and take a moment to tear down and return a value. Waiting a
//! beat after the deadline lets that value propagate instead of being masked
//! by the deadline error, making the observable outcome more deterministic.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use crate::ctx::Ctx;
use crate::error::{LifecycleError, TimeoutSource};

/// Runs `f` on its own task, bounded by `timeout` and dominated by `ctx`.
///
/// Returns the function's own output, or the cancellation cause when the call
/// context is torn down first: the parent's cause if the parent was already
/// (or becomes) cancelled, `Timeout(source)` when this call's deadline fires,
/// or [`LifecycleError::PrematureChannelClose`] when the call task dies
/// without producing a value.
///
/// `f` is never invoked on an already-cancelled context.
pub(crate) async fn async_call<T, F, Fut>(
    ctx: &Ctx,
    source: TimeoutSource,
    timeout: Duration,
    grace: Duration,
    f: F,
) -> Result<T, LifecycleError>
where
    T: Send + 'static,
    F: FnOnce(Ctx) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    if ctx.is_cancelled() {
        return Err(ctx.cause());
    }

    let call_ctx = ctx.child_with_timeout(timeout, source);

    let (tx, mut rx) = oneshot::channel::<T>();
    tokio::spawn({
        let call_ctx = call_ctx.clone();
        async move {
            let _ = tx.send(f(call_ctx).await);
        }
    });

    let result = tokio::select! {
        res = &mut rx => outcome(res),
        _ = call_ctx.cancelled() => {
            if grace.is_zero() {
                Err(call_ctx.cause())
            } else {
                // The call task keeps its own Ctx clone, so a result produced
                // inside the window still lands in the slot.
                match time::timeout(grace, rx).await {
                    Ok(res) => outcome(res),
                    Err(_) => Err(call_ctx.cause()),
                }
            }
        }
    };

    // Release the deadline timer and cancel an abandoned call task.
    call_ctx.cancel(None);
    result
}

fn outcome<T>(res: Result<T, oneshot::error::RecvError>) -> Result<T, LifecycleError> {
    res.map_err(|_| LifecycleError::PrematureChannelClose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const GRACE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn already_cancelled_parent_skips_the_call() {
        let ctx = Ctx::new();
        ctx.cancel(Some(LifecycleError::fail("parent dead")));

        let res: Result<i32, _> = async_call(
            &ctx,
            TimeoutSource::CheckReadyCall,
            Duration::from_secs(1),
            GRACE,
            |_ctx| async { panic!("shouldn't be called") },
        )
        .await;
        assert_eq!(res, Err(LifecycleError::fail("parent dead")));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_return_passes_through() {
        let ctx = Ctx::new();
        let res = async_call(
            &ctx,
            TimeoutSource::CheckReadyCall,
            Duration::from_secs(1),
            GRACE,
            |_ctx| async { 84 },
        )
        .await;
        assert_eq!(res, Ok(84));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_but_in_time_return_passes_through() {
        let ctx = Ctx::new();
        let t0 = Instant::now();
        let res = async_call(
            &ctx,
            TimeoutSource::CheckReadyCall,
            Duration::from_secs(5),
            GRACE,
            |_ctx| async {
                time::sleep(Duration::from_secs(2)).await;
                63
            },
        )
        .await;
        assert_eq!(res, Ok(63));
        assert_eq!(t0.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_grace_reports_the_tagged_deadline() {
        let ctx = Ctx::new();
        let t0 = Instant::now();
        let res: Result<i32, _> = async_call(
            &ctx,
            TimeoutSource::StartStopStart,
            Duration::from_secs(1),
            Duration::ZERO,
            |cctx| async move {
                cctx.cancelled().await;
                67
            },
        )
        .await;
        assert_eq!(
            res,
            Err(LifecycleError::Timeout(TimeoutSource::StartStopStart))
        );
        assert!(res.unwrap_err().is_deadline_exceeded());
        assert_eq!(t0.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_no_luck_in_grace() {
        let ctx = Ctx::new();
        let t0 = Instant::now();
        let res: Result<i32, _> = async_call(
            &ctx,
            TimeoutSource::ShutdownCall,
            Duration::from_secs(4),
            Duration::from_secs(1),
            |_ctx| async {
                time::sleep(Duration::from_secs(6)).await;
                64
            },
        )
        .await;
        assert_eq!(res, Err(LifecycleError::Timeout(TimeoutSource::ShutdownCall)));
        assert_eq!(t0.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_inside_grace_is_preferred_over_the_deadline() {
        let ctx = Ctx::new();
        let t0 = Instant::now();
        let res = async_call(
            &ctx,
            TimeoutSource::ShutdownCall,
            Duration::from_secs(8),
            Duration::from_secs(2),
            |cctx| async move {
                cctx.cancelled().await;
                time::sleep(Duration::from_secs(1)).await;
                96
            },
        )
        .await;
        assert_eq!(res, Ok(96));
        assert_eq!(t0.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_cause_is_honored() {
        let ctx = Ctx::new();
        tokio::spawn({
            let ctx = ctx.clone();
            async move {
                time::sleep(Duration::from_secs(1)).await;
                ctx.cancel(Some(LifecycleError::fail("parent dead")));
            }
        });

        let t0 = Instant::now();
        let res: Result<i32, _> = async_call(
            &ctx,
            TimeoutSource::CheckReadyCall,
            Duration::from_secs(60),
            Duration::ZERO,
            |cctx| async move {
                cctx.cancelled().await;
                time::sleep(Duration::from_secs(1)).await;
                12
            },
        )
        .await;
        assert_eq!(res, Err(LifecycleError::fail("parent dead")));
        assert_eq!(t0.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn dying_call_task_reports_premature_close() {
        let ctx = Ctx::new();
        let res: Result<i32, _> = async_call(
            &ctx,
            TimeoutSource::CheckReadyCall,
            Duration::from_secs(3),
            Duration::from_secs(1),
            |_ctx| async {
                time::sleep(Duration::from_secs(1)).await;
                panic!("dies without a value");
            },
        )
        .await;
        assert_eq!(res, Err(LifecycleError::PrematureChannelClose));
    }
}
