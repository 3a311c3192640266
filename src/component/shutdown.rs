//! # Shutdown phase: two escalating stages, then abandonment.
//!
//! 1. **By user request** — invoke the user `shutdown` callback (bounded by
//!    the call timeout) and wait for the run task to return, bounded by the
//!    completion timeout. Mirrors the common server contract where the
//!    shutdown call returning does not mean the serve loop has returned.
//! 2. **By cancellation** — cancel the run context and give the run task one
//!    grace window to exit.
//! 3. **Abandon** — report [`LifecycleError::ShutdownAbandoned`]; the run
//!    task is left behind so the rest of the application can keep shutting
//!    down.
//!
//! Stage-1 errors (a failing or overdue shutdown call, an expired completion
//! timeout) are logged against the component but are not themselves fatal: a
//! dead component is the goal, however it gets there.

use crate::component::async_call::async_call;
use crate::component::Component;
use crate::ctx::Ctx;
use crate::error::{LifecycleError, Stage, TimeoutSource};

impl Component {
    /// Runs the shutdown stages; `Ok` once the run task has returned.
    pub(crate) async fn shutdown(&mut self, ctx: &Ctx) -> Result<(), LifecycleError> {
        self.shutdown_via_call(ctx).await;
        self.shutdown_via_cancel().await;
        if self.is_dead() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownAbandoned)
        }
    }

    /// Stage 1: ask politely and wait for the run task to follow.
    async fn shutdown_via_call(&mut self, ctx: &Ctx) {
        if self.is_dead() {
            return;
        }

        let completion = ctx.child_with_timeout(
            self.shutdown_completion_timeout,
            TimeoutSource::ShutdownCompletion,
        );

        let shutdown_fn = match self.shutdown_fn.take() {
            Some(f) => f,
            None => return,
        };
        let res = async_call(
            &completion,
            TimeoutSource::ShutdownCall,
            self.shutdown_call_timeout,
            self.grace,
            move |call_ctx| shutdown_fn(call_ctx),
        )
        .await;
        match res {
            Err(call_err) => (self.error_log)(Stage::Shutdown, call_err),
            Ok(Err(user_err)) => (self.error_log)(Stage::Shutdown, user_err),
            Ok(Ok(())) => {}
        }

        tokio::select! {
            _ = self.done.cancelled() => {}
            _ = completion.cancelled() => {
                (self.error_log)(Stage::Shutdown, completion.cause());
            }
        }

        // Release the completion timer.
        completion.cancel(None);
    }

    /// Stage 2: cancel the run context and allow one grace window.
    async fn shutdown_via_cancel(&mut self) {
        if self.is_dead() {
            return;
        }

        if let Some(run_cancel) = &self.run_cancel {
            run_cancel.cancel(None);
        }
        let _ = tokio::time::timeout(self.grace, self.done.cancelled()).await;
    }
}
