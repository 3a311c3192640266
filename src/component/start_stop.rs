//! # Synthesis of run/shutdown from start/stop phase functions.
//!
//! Some components are naturally a pair of non-blocking calls (`start` the
//! listener, later `stop` it) rather than one blocking `run`.
//! [`StartStopWrapper`] adapts that shape onto the native contract:
//!
//! - the synthesized `run` performs the timed `start` call, parks on a
//!   one-shot stop-request signal, then performs the timed `stop` call;
//! - the synthesized `shutdown` fires the signal.
//!
//! Firing before `run` has parked is legal (the signal is created on first
//! touch), as is firing twice. Running twice is not: one run per spec.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::component::async_call::async_call;
use crate::ctx::Ctx;
use crate::error::{LifecycleError, TimeoutSource};
use crate::spec::OpFn;

pub(crate) struct StartStopWrapper {
    start_timeout: Duration,
    stop_timeout: Duration,
    grace: Duration,
    state: Mutex<WrapperState>,
}

#[derive(Default)]
struct WrapperState {
    start: Option<OpFn>,
    stop: Option<OpFn>,
    stop_requested: Option<CancellationToken>,
    run_called: bool,
}

impl StartStopWrapper {
    pub(crate) fn new(
        start: OpFn,
        stop: OpFn,
        start_timeout: Duration,
        stop_timeout: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            start_timeout,
            stop_timeout,
            grace,
            state: Mutex::new(WrapperState {
                start: Some(start),
                stop: Some(stop),
                stop_requested: None,
                run_called: false,
            }),
        }
    }

    /// The synthesized run function.
    ///
    /// # Panics
    /// Panics when invoked twice; a wrapper backs exactly one component run.
    pub(crate) async fn run(&self, ctx: Ctx) -> Result<(), LifecycleError> {
        let (start, stop_requested) = self.init_for_run();

        self.do_call(&ctx, TimeoutSource::StartStopStart, self.start_timeout, start)
            .await?;

        stop_requested.cancelled().await;

        let stop = self.take_stop();
        self.do_call(&ctx, TimeoutSource::StartStopStop, self.stop_timeout, stop)
            .await
    }

    /// The synthesized shutdown function: fires the stop-request signal.
    /// Safe to call before `run` and safe to call repeatedly.
    pub(crate) fn shutdown(&self) {
        let mut state = self.lock_state();
        state
            .stop_requested
            .get_or_insert_with(CancellationToken::new)
            .cancel();
    }

    fn init_for_run(&self) -> (OpFn, CancellationToken) {
        let mut state = self.lock_state();
        if state.run_called {
            panic!("internal: StartStopWrapper run called twice");
        }
        state.run_called = true;

        let start = state
            .start
            .take()
            .unwrap_or_else(|| unreachable!("start fn present until first run"));
        let signal = state
            .stop_requested
            .get_or_insert_with(CancellationToken::new)
            .clone();
        (start, signal)
    }

    fn take_stop(&self) -> OpFn {
        self.lock_state()
            .stop
            .take()
            .unwrap_or_else(|| unreachable!("stop fn present until first run"))
    }

    async fn do_call(
        &self,
        ctx: &Ctx,
        source: TimeoutSource,
        timeout: Duration,
        f: OpFn,
    ) -> Result<(), LifecycleError> {
        match async_call(ctx, source, timeout, self.grace, move |cctx| f(cctx)).await {
            Err(call_err) => Err(call_err),
            Ok(user_result) => user_result,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WrapperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
