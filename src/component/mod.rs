//! # Runtime component and its lifecycle phases.
//!
//! A [`Component`] is built from a [`ComponentSpec`](crate::ComponentSpec)
//! when a launch request is accepted. Its life is three strictly ordered
//! phases — start ([`Component::start`]), readiness
//! ([`Component::wait_ready`], in `ready.rs`) and shutdown
//! ([`Component::shutdown`], in `shutdown.rs`) — plus an exit monitor task
//! that runs concurrently with all of them.
//!
//! The component never holds the controller. It is connected through two
//! injected capabilities:
//!
//! - `error_log(stage, err)` — record an error against this component;
//! - `notify_exited(err)` — the run task has returned (or died).
//!
//! ```text
//!   start ──spawns──► run task ──result──► one-slot channel ──► exit monitor
//!              │                                                    │
//!              └── done signal (fired on every run-task exit path)  └─► notify_exited
//! ```

mod async_call;
mod ready;
mod shutdown;
mod start_stop;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::bus::Bus;
use crate::ctx::Ctx;
use crate::error::{LifecycleError, Stage};
use crate::event::{Event, EventKind};
use crate::spec::{CheckReadyFn, ComponentSpec, Mode, OpFn};

use self::start_stop::StartStopWrapper;

/// Error sink injected by the controller: records `err` under `stage`.
pub(crate) type ErrorSink = Arc<dyn Fn(Stage, LifecycleError) + Send + Sync>;

/// Exit sink injected by the controller: the run task returned with `err`.
pub(crate) type ExitSink = Arc<dyn Fn(Option<LifecycleError>) + Send + Sync>;

pub(crate) struct Component {
    name: String,

    run: Option<OpFn>,
    shutdown_fn: Option<OpFn>,
    shutdown_call_timeout: Duration,
    shutdown_completion_timeout: Duration,

    check_ready: Option<Arc<Mutex<CheckReadyFn>>>,
    check_ready_call_timeout: Duration,
    check_ready_backoff: crate::backoff::BackoffFn,
    check_ready_max_attempts: usize,

    grace: Duration,

    error_log: ErrorSink,
    notify_exited: ExitSink,
    bus: Bus,

    /// Cancel handle for the run context; present once started.
    run_cancel: Option<Ctx>,
    /// Fired when the run task has fully returned.
    done: CancellationToken,
}

impl Component {
    pub(crate) fn new(
        name: &str,
        spec: ComponentSpec,
        grace: Duration,
        error_log: ErrorSink,
        notify_exited: ExitSink,
        bus: Bus,
    ) -> Self {
        let (run, shutdown_fn) = match spec.mode {
            Mode::Run { run, shutdown } => (run, shutdown),
            Mode::StartStop {
                start,
                stop,
                start_timeout,
                stop_timeout,
            } => {
                let wrapper = Arc::new(StartStopWrapper::new(
                    start,
                    stop,
                    start_timeout,
                    stop_timeout,
                    grace,
                ));
                let run_wrapper = Arc::clone(&wrapper);
                let run: OpFn = Box::new(
                    move |ctx| -> BoxFuture<'static, Result<(), LifecycleError>> {
                        Box::pin(async move { run_wrapper.run(ctx).await })
                    },
                );
                let shutdown: OpFn = Box::new(
                    move |_ctx| -> BoxFuture<'static, Result<(), LifecycleError>> {
                        Box::pin(async move {
                            wrapper.shutdown();
                            Ok(())
                        })
                    },
                );
                (run, shutdown)
            }
        };

        Self {
            name: name.to_string(),
            run: Some(run),
            shutdown_fn: Some(shutdown_fn),
            shutdown_call_timeout: spec.shutdown_call_timeout,
            shutdown_completion_timeout: spec.shutdown_completion_timeout,
            check_ready: spec.check_ready.map(|probe| Arc::new(Mutex::new(probe))),
            check_ready_call_timeout: spec.check_ready_call_timeout,
            check_ready_backoff: spec.check_ready_backoff,
            check_ready_max_attempts: spec.check_ready_max_attempts,
            grace,
            error_log,
            notify_exited,
            bus,
            run_cancel: None,
            done: CancellationToken::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// True once the run task has fully returned.
    pub(crate) fn is_dead(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Start phase: spawn the run task and the exit monitor, return
    /// immediately.
    ///
    /// # Panics
    /// Panics when invoked twice; the controller starts a component once.
    pub(crate) fn start(&mut self, ctx: &Ctx) -> Result<(), LifecycleError> {
        let run = match self.run.take() {
            Some(run) => run,
            None => panic!("internal: Component start called twice"),
        };

        let run_ctx = ctx.child();
        self.run_cancel = Some(run_ctx.clone());

        let (run_tx, run_rx) = oneshot::channel();
        let done_guard = self.done.clone().drop_guard();
        tokio::spawn(async move {
            // Guard fires the done signal on every exit path, panics included,
            // and only after the result has been published.
            let _done = done_guard;
            let _ = run_tx.send(run(run_ctx).await);
        });

        tokio::spawn(monitor_exit(MonitorParams {
            ctx: ctx.clone(),
            run_rx,
            grace: self.grace,
            name: self.name.clone(),
            error_log: Arc::clone(&self.error_log),
            notify_exited: Arc::clone(&self.notify_exited),
            bus: self.bus.clone(),
        }));

        Ok(())
    }
}

struct MonitorParams {
    ctx: Ctx,
    run_rx: oneshot::Receiver<Result<(), LifecycleError>>,
    grace: Duration,
    name: String,
    error_log: ErrorSink,
    notify_exited: ExitSink,
    bus: Bus,
}

/// Watches the run task until it returns, then reports through
/// `notify_exited`.
///
/// When the ambient context is cancelled first, the run task is given one
/// grace window to produce its result; past that the monitor logs
/// [`LifecycleError::MonitorExitedWhileStillAlive`] and gives up rather than
/// wait on a task that may never return.
async fn monitor_exit(params: MonitorParams) {
    let MonitorParams {
        ctx,
        mut run_rx,
        grace,
        name,
        error_log,
        notify_exited,
        bus,
    } = params;

    let received = tokio::select! {
        res = &mut run_rx => Some(res),
        _ = ctx.cancelled() => None,
    };

    let received = match received {
        Some(res) => res,
        None => match time::timeout(grace, run_rx).await {
            Ok(res) => res,
            Err(_) => {
                error_log(
                    Stage::RunExited,
                    LifecycleError::MonitorExitedWhileStillAlive,
                );
                return;
            }
        },
    };

    let err = match received {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(_closed) => Some(LifecycleError::PrematureChannelClose),
    };

    let mut event = Event::now(EventKind::ComponentExited).with_component(&name);
    if let Some(err) = &err {
        event = event.with_error(err.to_string());
    }
    bus.publish(event);

    notify_exited(err);
}
