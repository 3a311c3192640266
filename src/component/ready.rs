//! # Readiness phase: probe a started component until it reports ready.
//!
//! The probe loop runs between start and steady state. Each attempt performs
//! one timed `check_ready` call; between attempts it sleeps the configured
//! backoff while staying responsive to everything that should cut the wait
//! short: a stop request (the abort signal), ambient cancellation, and the
//! component's own run task exiting.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::component::async_call::async_call;
use crate::component::Component;
use crate::ctx::Ctx;
use crate::error::{LifecycleError, TimeoutSource};
use crate::event::{Event, EventKind};
use crate::spec::CheckReadyFn;

impl Component {
    /// Runs the readiness loop; immediately ready when no probe was
    /// configured.
    ///
    /// Returns `Ok(())` once the probe reports ready, or the first error that
    /// aborts the wait: a fired abort signal, ambient cancellation, a probe
    /// error or timeout, the component exiting, or the attempt budget running
    /// out.
    pub(crate) async fn wait_ready(
        &mut self,
        ctx: &Ctx,
        abort: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        let probe = match &self.check_ready {
            Some(probe) => Arc::clone(probe),
            None => return Ok(()),
        };

        for attempt in 0..self.check_ready_max_attempts {
            if abort.is_cancelled() {
                return Err(LifecycleError::WaitReadyAborted);
            }
            if attempt > 0 {
                self.ready_backoff(ctx, abort, attempt as u64).await?;
                // Unbiased select: the abort may have fired while the
                // backoff race still picked the elapsed-sleep branch.
                if abort.is_cancelled() {
                    return Err(LifecycleError::WaitReadyAborted);
                }
            }
            if self.ready_check_once(ctx, &probe).await? {
                return Ok(());
            }
        }
        Err(LifecycleError::WaitReadyExceededMaxAttempts)
    }

    async fn ready_backoff(
        &mut self,
        ctx: &Ctx,
        abort: &CancellationToken,
        attempt: u64,
    ) -> Result<(), LifecycleError> {
        let delay = (self.check_ready_backoff)();
        if delay.is_zero() {
            return Ok(());
        }

        self.bus.publish(
            Event::now(EventKind::BackoffScheduled)
                .with_component(self.name())
                .with_attempt(attempt)
                .with_delay(delay),
        );

        tokio::select! {
            _ = time::sleep(delay) => Ok(()),
            _ = abort.cancelled() => Err(LifecycleError::WaitReadyAborted),
            _ = ctx.cancelled() => Err(ctx.cause()),
            _ = self.done.cancelled() => Err(LifecycleError::WaitReadyComponentExited),
        }
    }

    /// One probe invocation, raced against the component exiting.
    async fn ready_check_once(
        &self,
        ctx: &Ctx,
        probe: &Arc<Mutex<CheckReadyFn>>,
    ) -> Result<bool, LifecycleError> {
        if self.is_dead() {
            return Err(LifecycleError::WaitReadyComponentExited);
        }

        let probe = Arc::clone(probe);
        let call = async_call(
            ctx,
            TimeoutSource::CheckReadyCall,
            self.check_ready_call_timeout,
            self.grace,
            move |call_ctx| -> BoxFuture<'static, Result<bool, LifecycleError>> {
                // The lock is held only while creating the future, never
                // across its execution.
                let mut probe = probe.lock().unwrap_or_else(PoisonError::into_inner);
                (*probe)(call_ctx)
            },
        );

        tokio::select! {
            res = call => match res {
                Ok(probe_result) => probe_result,
                Err(call_err) => Err(call_err),
            },
            _ = self.done.cancelled() => Err(LifecycleError::WaitReadyComponentExited),
        }
    }
}
